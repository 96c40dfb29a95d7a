//! Behaviour every `CacheHandler` backend must share.
//!
//! Each check uses its own key prefix so one backend instance can run them
//! all, including a shared Redis container.

#![allow(dead_code)]

use keystash_cache::CacheHandler;

pub async fn write_then_read(cache: &dyn CacheHandler, ns: &str) {
    let key = format!("{ns}:scalar");
    cache.write(&key, "v1").await.unwrap();
    assert_eq!(cache.read(&key).await.unwrap(), "v1");
    assert!(cache.exists(&key).await.unwrap());

    cache.write(&key, "v2").await.unwrap();
    assert_eq!(cache.read(&key).await.unwrap(), "v2");
}

pub async fn missing_record_reads_empty(cache: &dyn CacheHandler, ns: &str) {
    let key = format!("{ns}:missing");
    assert!(!cache.exists(&key).await.unwrap());
    assert_eq!(cache.read(&key).await.unwrap(), "");
    assert_eq!(cache.read_field(&key, "f").await.unwrap(), "");
    assert!(!cache.field_exists(&key, "f").await.unwrap());
}

pub async fn fields_are_independent(cache: &dyn CacheHandler, ns: &str) {
    let key = format!("{ns}:hash");
    cache.write_field(&key, "a", "1").await.unwrap();
    cache.write_field(&key, "b", "2").await.unwrap();
    cache.write_field(&key, "a", "3").await.unwrap();

    assert_eq!(cache.read_field(&key, "a").await.unwrap(), "3");
    assert_eq!(cache.read_field(&key, "b").await.unwrap(), "2");
    assert!(cache.field_exists(&key, "b").await.unwrap());

    let fields: Vec<String> = cache.fields(&key).await.unwrap().collect();
    assert_eq!(fields, vec!["a", "b"]);

    cache.destroy_field(&key, "a").await.unwrap();
    assert!(!cache.field_exists(&key, "a").await.unwrap());
    assert_eq!(cache.read_field(&key, "b").await.unwrap(), "2");
}

pub async fn write_if_absent_keeps_first(cache: &dyn CacheHandler, ns: &str) {
    let key = format!("{ns}:claim");
    assert!(cache.write_field_if_absent(&key, "owner", "a").await.unwrap());
    assert!(!cache.write_field_if_absent(&key, "owner", "b").await.unwrap());
    assert_eq!(cache.read_field(&key, "owner").await.unwrap(), "a");

    // Other fields of the same record are still free.
    assert!(cache.write_field_if_absent(&key, "other", "c").await.unwrap());
}

pub async fn destroy_removes_record(cache: &dyn CacheHandler, ns: &str) {
    let key = format!("{ns}:doomed");
    cache.write_field(&key, "a", "1").await.unwrap();
    cache.destroy(&key).await.unwrap();
    assert!(!cache.exists(&key).await.unwrap());

    // Destroying again is not an error.
    cache.destroy(&key).await.unwrap();
}

pub async fn rename_moves_every_field(cache: &dyn CacheHandler, ns: &str) {
    let old = format!("{ns}:old");
    let new = format!("{ns}:new");
    cache.write_field(&old, "a", "1").await.unwrap();
    cache.write_field(&old, "b", "2").await.unwrap();

    assert!(cache.rename(&old, &new).await.unwrap());
    assert!(!cache.exists(&old).await.unwrap());
    assert_eq!(cache.read_field(&new, "a").await.unwrap(), "1");
    assert_eq!(cache.read_field(&new, "b").await.unwrap(), "2");

    // The source is gone, so a second rename reports failure.
    assert!(!cache.rename(&old, &new).await.unwrap());
}

pub async fn wildcard_destroy_is_exact(cache: &dyn CacheHandler, ns: &str) {
    for key in ["code:1", "code:2", "code:3", "consumed_code:1", "codex"] {
        cache.write(&format!("{ns}:{key}"), "x").await.unwrap();
    }

    cache.destroy(&format!("{ns}:code:*")).await.unwrap();

    let left: Vec<String> = cache.keys(&format!("{ns}:*")).await.unwrap().collect();
    assert_eq!(
        left,
        vec![format!("{ns}:codex"), format!("{ns}:consumed_code:1")]
    );
}

pub async fn keys_snapshot(cache: &dyn CacheHandler, ns: &str) {
    for i in 0..5 {
        cache.write(&format!("{ns}:k:{i}"), "x").await.unwrap();
    }
    cache.write(&format!("{ns}:other"), "x").await.unwrap();

    let mut iter = cache.keys(&format!("{ns}:k:*")).await.unwrap();
    assert_eq!(iter.len(), 5);

    // Later writes and deletes do not leak into an iterator already built.
    cache.write(&format!("{ns}:k:9"), "x").await.unwrap();
    cache.destroy(&format!("{ns}:k:0")).await.unwrap();

    let first = iter.next().unwrap();
    assert_eq!(first, format!("{ns}:k:0"));
    assert_eq!(iter.count(), 4);
}

pub async fn metacharacters_match_literally(cache: &dyn CacheHandler, ns: &str) {
    cache.write(&format!("{ns}:a.b"), "x").await.unwrap();
    cache.write(&format!("{ns}:axb"), "x").await.unwrap();
    cache.write(&format!("{ns}:a?b"), "x").await.unwrap();

    let keys: Vec<String> = cache.keys(&format!("{ns}:a.*")).await.unwrap().collect();
    assert_eq!(keys, vec![format!("{ns}:a.b")]);

    let keys: Vec<String> = cache.keys(&format!("{ns}:a?*")).await.unwrap().collect();
    assert_eq!(keys, vec![format!("{ns}:a?b")]);
}

pub async fn run_all(cache: &dyn CacheHandler, ns: &str) {
    write_then_read(cache, ns).await;
    missing_record_reads_empty(cache, ns).await;
    fields_are_independent(cache, ns).await;
    write_if_absent_keeps_first(cache, ns).await;
    destroy_removes_record(cache, ns).await;
    rename_moves_every_field(cache, &format!("{ns}:rn")).await;
    wildcard_destroy_is_exact(cache, &format!("{ns}:wd")).await;
    keys_snapshot(cache, &format!("{ns}:ks")).await;
    metacharacters_match_literally(cache, &format!("{ns}:mc")).await;
}
