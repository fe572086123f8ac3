//! Context extras across spawned tasks on a multi-threaded runtime.

use quelog::{get_log_extra, update_log_extra, ExtraFields, LogExtraExt};
use serde_json::json;

fn fields(pairs: &[(&str, serde_json::Value)]) -> ExtraFields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_child_gets_a_copy_not_shared_state() {
    async {
        update_log_extra(fields(&[("request_id", json!("r-1"))]));

        let child = tokio::spawn(
            async {
                // crossing an await point may move the task to another
                // worker thread; the scope travels with the future
                tokio::task::yield_now().await;
                update_log_extra(fields(&[("child_only", json!(true))]));
                get_log_extra()
            }
            .with_log_extra(),
        );

        let child_extra = child.await.unwrap();
        assert_eq!(child_extra["request_id"], json!("r-1"));
        assert_eq!(child_extra["child_only"], json!(true));

        // the child's write never reached the parent scope
        let parent_extra = get_log_extra();
        assert_eq!(parent_extra, fields(&[("request_id", json!("r-1"))]));
    }
    .with_extra(ExtraFields::new())
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn siblings_do_not_see_each_other() {
    async {
        update_log_extra(fields(&[("shared", json!("base"))]));

        let spawn_child = |tag: &'static str| {
            tokio::spawn(
                async move {
                    update_log_extra(fields(&[("tag", json!(tag))]));
                    tokio::task::yield_now().await;
                    get_log_extra()
                }
                .with_log_extra(),
            )
        };
        let a = spawn_child("a");
        let b = spawn_child("b");

        let a = a.await.unwrap();
        let b = b.await.unwrap();
        assert_eq!(a["shared"], json!("base"));
        assert_eq!(b["shared"], json!("base"));
        assert_eq!(a["tag"], json!("a"));
        assert_eq!(b["tag"], json!("b"));
    }
    .with_extra(ExtraFields::new())
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshot_is_taken_at_spawn_time() {
    async {
        update_log_extra(fields(&[("phase", json!("before"))]));
        let child = async { get_log_extra() }.with_log_extra();

        // updates after the snapshot do not reach the already-wrapped child
        update_log_extra(fields(&[("phase", json!("after"))]));

        let child_extra = tokio::spawn(child).await.unwrap();
        assert_eq!(child_extra, fields(&[("phase", json!("before"))]));
        assert_eq!(get_log_extra()["phase"], json!("after"));
    }
    .with_extra(ExtraFields::new())
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn explicit_scope_replaces_inheritance() {
    async {
        update_log_extra(fields(&[("inherited", json!(true))]));

        let child_extra = tokio::spawn(
            async { get_log_extra() }.with_extra(fields(&[("explicit", json!(1))])),
        )
        .await
        .unwrap();

        assert_eq!(child_extra, fields(&[("explicit", json!(1))]));
    }
    .with_extra(ExtraFields::new())
    .await;
}
