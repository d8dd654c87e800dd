use horde_db::repositories::SettingsRepo;
use horde_db::DbPool;

async fn pool() -> DbPool {
    let pool = horde_db::connect_in_memory().await.unwrap();
    horde_db::run_migrations(&pool).await.unwrap();
    pool
}

#[tokio::test]
async fn test_missing_key_is_none() {
    let pool = pool().await;
    assert_eq!(SettingsRepo::get(&pool, "api_key").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_then_overwrite() {
    let pool = pool().await;
    SettingsRepo::set(&pool, "page_size", "25").await.unwrap();
    SettingsRepo::set(&pool, "page_size", "50").await.unwrap();

    assert_eq!(
        SettingsRepo::get(&pool, "page_size").await.unwrap().as_deref(),
        Some("50")
    );
    assert_eq!(SettingsRepo::list(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete() {
    let pool = pool().await;
    SettingsRepo::set(&pool, "api_key", "abc").await.unwrap();
    assert!(SettingsRepo::delete(&pool, "api_key").await.unwrap());
    assert!(!SettingsRepo::delete(&pool, "api_key").await.unwrap());
    assert_eq!(SettingsRepo::get(&pool, "api_key").await.unwrap(), None);
}

#[tokio::test]
async fn test_list_is_ordered_by_key() {
    let pool = pool().await;
    SettingsRepo::set(&pool, "page_size", "25").await.unwrap();
    SettingsRepo::set(&pool, "api_key", "abc").await.unwrap();
    SettingsRepo::set(&pool, "embed_metadata", "true").await.unwrap();

    let keys: Vec<String> = SettingsRepo::list(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.key)
        .collect();
    assert_eq!(keys, vec!["api_key", "embed_metadata", "page_size"]);
}
