//! End-to-end cart session tests over the real stores.
//!
//! The file-store tests run everywhere. The `PostgreSQL` test needs a
//! database and is ignored by default:
//!
//! ```bash
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p little-sprout-storefront -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use chrono::Utc;
use little_sprout_core::{
    AddToCartRequest, CartItemId, Category, CategoryId, Money, Product, ProductId,
    UpdateCartItemRequest, UserId,
};
use little_sprout_storefront::auth::{AuthEvent, Identity, SessionAuth};
use little_sprout_storefront::cart::{CartSessionManager, CartSettings};
use little_sprout_storefront::catalog::{CatalogProvider, MemoryCatalog};
use little_sprout_storefront::db::{self, cart_items::PgCartStore};
use little_sprout_storefront::stores::file::FileLocalStore;
use little_sprout_storefront::stores::memory::MemoryCartStore;
use little_sprout_storefront::stores::{LocalCartStore, RemoteCartStore};
use rust_decimal::Decimal;

fn catalog() -> Arc<dyn CatalogProvider> {
    let now = Utc::now();
    let product = |id: &str, cents: i64| Product {
        id: ProductId::new(id),
        category_id: CategoryId::new("onesies"),
        name: format!("Onesie {id}"),
        description: None,
        image: None,
        price: Money::from_cents(cents),
        sizes: vec!["0-3M".to_owned()],
        colors: vec!["Oat".to_owned()],
        featured: false,
        in_stock: true,
        created_at: now,
        updated_at: now,
    };
    Arc::new(MemoryCatalog::new(
        vec![Category {
            id: CategoryId::new("onesies"),
            name: "Onesies".to_owned(),
            image: None,
            created_at: now,
            updated_at: now,
        }],
        vec![product("starter-set", 2000), product("sun-hat", 1250)],
    ))
}

fn manager(
    remote: Arc<dyn RemoteCartStore>,
    local: Arc<dyn LocalCartStore>,
) -> CartSessionManager {
    CartSessionManager::new(remote, local, catalog(), CartSettings::default())
}

#[tokio::test]
async fn test_guest_cart_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let remote: Arc<dyn RemoteCartStore> = Arc::new(MemoryCartStore::new());

    let first = manager(remote.clone(), Arc::new(FileLocalStore::new(dir.path())));
    assert!(first.initialize(&SessionAuth::new()).await);
    assert!(first.add(AddToCartRequest::new("starter-set", 2).with_size("0-3M")).await);
    assert!(first.add(AddToCartRequest::new("sun-hat", 1)).await);
    drop(first);

    let second = manager(remote, Arc::new(FileLocalStore::new(dir.path())));
    assert!(second.initialize(&SessionAuth::new()).await);

    let cart = second.current_cart().unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.items[0].id, CartItemId::Local(0));
    assert_eq!(cart.items[0].selected_size.as_deref(), Some("0-3M"));
    assert_eq!(cart.items[1].id, CartItemId::Local(1));

    // 40.00 + 12.50 = 52.50, over the free shipping threshold
    let summary = second.current_summary();
    assert_eq!(summary.subtotal, Money::from_cents(5250));
    assert_eq!(summary.tax, Some(Money::from_cents(420)));
    assert_eq!(summary.shipping, Some(Money::from_cents(0)));
    assert_eq!(summary.total_amount, Money::from_cents(5670));

    // New lines keep counting past the restored ones
    assert!(second.add(AddToCartRequest::new("sun-hat", 1).with_color("Oat")).await);
    let cart = second.current_cart().unwrap();
    assert_eq!(cart.items[2].id, CartItemId::Local(2));
}

#[tokio::test]
async fn test_sign_in_moves_guest_cart_and_deletes_file() {
    let dir = tempfile::tempdir().unwrap();
    let local = FileLocalStore::new(dir.path());
    let record = local.path().to_path_buf();
    let remote = MemoryCartStore::new();

    let cart = manager(Arc::new(remote.clone()), Arc::new(local));
    assert!(cart.initialize(&SessionAuth::new()).await);
    assert!(cart.add(AddToCartRequest::new("sun-hat", 3)).await);
    assert!(record.exists());

    assert!(
        cart.on_auth_transition(AuthEvent::SignedIn(Identity::new("parent-1")))
            .await
    );
    assert!(!record.exists());

    let rows = remote.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 3);
    assert_eq!(cart.item_count(), 3);
    assert!(!cart.current_cart().unwrap().items[0].id.is_local());

    // Signing out starts an empty guest cart and leaves the account cart alone
    assert!(cart.on_auth_transition(AuthEvent::SignedOut).await);
    assert_eq!(cart.item_count(), 0);
    assert_eq!(remote.rows().await.len(), 1);
}

#[tokio::test]
async fn test_corrupt_record_is_replaced_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let local = FileLocalStore::new(dir.path());
    std::fs::write(local.path(), b"{ not json").unwrap();

    let cart = manager(Arc::new(MemoryCartStore::new()), Arc::new(local.clone()));
    assert!(cart.initialize(&SessionAuth::new()).await);
    assert_eq!(cart.item_count(), 0);

    assert!(cart.add(AddToCartRequest::new("starter-set", 1)).await);
    let saved = local.load().await.unwrap().unwrap();
    assert_eq!(saved.items.len(), 1);
}

#[tokio::test]
#[ignore = "requires STOREFRONT_DATABASE_URL"]
async fn test_postgres_account_cart() {
    let url = std::env::var("STOREFRONT_DATABASE_URL").unwrap();
    let pool = db::create_pool(&secrecy::SecretString::from(url)).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let store = PgCartStore::new(pool);
    let user = UserId::new(format!("it-{}", uuid::Uuid::new_v4()));
    let dir = tempfile::tempdir().unwrap();
    let cart = manager(Arc::new(store.clone()), Arc::new(FileLocalStore::new(dir.path())));

    assert!(cart.initialize(&SessionAuth::new()).await);
    assert!(cart.add(AddToCartRequest::new("starter-set", 1)).await);
    assert!(
        cart.on_auth_transition(AuthEvent::SignedIn(Identity::new(user.clone())))
            .await
    );
    assert!(cart.add(AddToCartRequest::new("starter-set", 2)).await);

    let rows = store.list(&user).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 3);
    assert_eq!(
        cart.current_summary().subtotal.amount(),
        Decimal::new(6000, 2)
    );

    // Moving the unsized line onto the sized one folds it in
    assert!(cart.add(AddToCartRequest::new("starter-set", 1).with_size("0-3M")).await);
    let unsized_line = cart
        .current_cart()
        .unwrap()
        .items
        .into_iter()
        .find(|item| item.selected_size.is_none())
        .unwrap();
    let request = UpdateCartItemRequest {
        cart_item_id: unsized_line.id,
        quantity: 3,
        selected_size: Some("0-3M".to_owned()),
        selected_color: None,
    };
    assert!(cart.update(request).await);
    let rows = store.list(&user).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 4);
    assert_eq!(rows[0].selected_size, "0-3M");

    assert!(cart.clear().await);
    assert!(store.list(&user).await.unwrap().is_empty());
}
