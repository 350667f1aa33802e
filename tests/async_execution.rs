use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;

use sqlforge::driver::SqliteDriver;
use sqlforge::hydrate::{Hydrate, MemberMap};
use sqlforge::statement::StatementBuilder;
use sqlforge::{CancelToken, Error, QueryOptions, Session};

// counts far enough that only an interrupt ends it in test time
const ENDLESS: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 100000000000) \
                       SELECT MAX(x) FROM c";

#[derive(Default, Debug, PartialEq)]
struct Task {
    id: i64,
    title: String,
}

impl Hydrate for Task {
    fn describe(map: &mut MemberMap<Self>) {
        map.field("Id", |t: &mut Task, v| t.id = v)
            .field("Title", |t: &mut Task, v| t.title = v);
    }
}

fn seeded(count: i64) -> Session {
    let session = Session::new(Arc::new(SqliteDriver::in_memory().unwrap()));
    let mut ddl = StatementBuilder::new();
    ddl.append("CREATE TABLE Task (Id INTEGER PRIMARY KEY, Title TEXT)");
    session.execute_non_query(ddl.build()).unwrap();
    for id in 1..=count {
        let mut insert = StatementBuilder::new();
        insert.insert_into("Task", &[("Id", id.into()), ("Title", format!("task {}", id).into())]);
        session.execute_non_query(insert.build()).unwrap();
    }
    session
}

fn all_tasks() -> StatementBuilder {
    let mut select = StatementBuilder::new();
    select.select(&["Id", "Title"]).from("Task").append("ORDER BY Id");
    select
}

#[tokio::test(flavor = "multi_thread")]
async fn query_many_async_fills_every_row() {
    let session = seeded(5);
    let tasks: Vec<Task> = session
        .query_many_async(all_tasks().build(), &CancelToken::new())
        .await
        .expect("query completes");
    assert_eq!(tasks.len(), 5);
    assert_eq!(tasks[4], Task { id: 5, title: String::from("task 5") });
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_yields_rows_in_order() {
    let session = seeded(20);
    let mut stream = session.query_stream::<Task>(all_tasks().build(), &CancelToken::new());
    let mut ids = Vec::new();
    while let Some(item) = stream.next().await {
        ids.push(item.expect("row is readable").id);
    }
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn already_cancelled_token_never_runs() {
    let session = seeded(1);
    let token = CancelToken::new();
    token.cancel();
    let mut delete = StatementBuilder::new();
    delete.delete_from("Task");
    let outcome = session.execute_non_query_async(delete.build(), &token).await;
    assert!(matches!(outcome, Err(Error::Cancelled)), "got {:?}", outcome);

    let mut count = StatementBuilder::new();
    count.select(&["COUNT(*)"]).from("Task");
    assert_eq!(session.execute_scalar::<i64>(count.build()).unwrap(), Some(1), "row must survive");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_interrupts_a_running_query() {
    let session = seeded(0);
    let token = CancelToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });
    let mut endless = StatementBuilder::new();
    endless.append(ENDLESS);
    let outcome = tokio::time::timeout(
        Duration::from_secs(30),
        session.execute_scalar_async::<i64>(endless.build(), &token),
    )
    .await
    .expect("cancellation must end the query");
    assert!(matches!(outcome, Err(Error::Cancelled)), "got {:?}", outcome);

    // the shared connection is usable again
    let tasks: Vec<Task> = session.query_many(all_tasks().build()).unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn deadline_turns_into_timeout() {
    let session = seeded(0).with_options(QueryOptions::with_timeout(Duration::from_millis(100)));
    let mut endless = StatementBuilder::new();
    endless.append(ENDLESS);
    let outcome = session
        .execute_scalar_async::<i64>(endless.build(), &CancelToken::new())
        .await;
    assert!(matches!(outcome, Err(Error::Timeout(_))), "got {:?}", outcome);
}

#[tokio::test(flavor = "multi_thread")]
async fn for_each_async_collects_through_a_channel() {
    let session = seeded(8);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handed = session
        .for_each_async::<Task, _>(all_tasks().build(), &CancelToken::new(), move |task| {
            if tx.send(task.id).is_err() || task.id == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap();
    assert_eq!(handed, 3);
    let mut ids = Vec::new();
    while let Some(id) = rx.recv().await {
        ids.push(id);
    }
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn records_async_keep_column_names() {
    let session = seeded(2);
    let records = session
        .query_records_async(all_tasks().build(), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].columns(), &[String::from("Id"), String::from("Title")]);
    assert_eq!(records[1].get_as::<String>("title").as_deref(), Some("task 2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_ends_with_timeout_when_the_deadline_passes() {
    let session = seeded(0).with_options(QueryOptions::with_timeout(Duration::from_millis(100)));
    let mut endless = StatementBuilder::new();
    endless.append(ENDLESS);
    let mut stream = session.query_stream::<Task>(endless.build(), &CancelToken::new());
    let first = tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .expect("the deadline must end the stream");
    assert!(matches!(first, Some(Err(Error::Timeout(_)))), "got {:?}", first);
    assert!(stream.next().await.is_none(), "nothing follows the timeout");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_ends_a_running_stream() {
    let session = seeded(0);
    let token = CancelToken::new();
    let mut endless = StatementBuilder::new();
    endless.append(ENDLESS);
    let mut stream = session.query_stream::<Task>(endless.build(), &token);
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });
    let first = tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .expect("cancellation must end the stream");
    assert!(matches!(first, Some(Err(Error::Cancelled))), "got {:?}", first);
}
