//! redb-based storage layer for orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Order records |
//! | `active_codes` | `code` | `order_id` | Pickup codes held by non-terminal orders |
//! | `inventory` | `product_id` | `bool` | Product availability flags |
//!
//! Box and telemetry state are memory-only and never stored here.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::order::Order;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for storing orders: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Active pickup code index: key = code, value = order_id
const ACTIVE_CODES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("active_codes");

/// Product availability: key = product_id, value = available
const INVENTORY_TABLE: TableDefinition<&str, bool> = TableDefinition::new("inventory");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable as soon as `commit()` returns.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_CODES_TABLE)?;
            let _ = write_txn.open_table(INVENTORY_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Commit a write transaction
    pub fn commit(&self, txn: WriteTransaction) -> StorageResult<()> {
        txn.commit()?;
        Ok(())
    }

    // ========== Orders ==========

    /// Insert or replace an order (within transaction)
    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get an order by ID
    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order by ID (within transaction)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get every stored order (unordered)
    pub fn get_all_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            orders.push(serde_json::from_slice(value.value())?);
        }

        Ok(orders)
    }

    /// Remove every order and release every active code (within transaction)
    ///
    /// Returns the number of orders removed.
    pub fn clear_orders(&self, txn: &WriteTransaction) -> StorageResult<u64> {
        let removed = txn.open_table(ORDERS_TABLE)?.len()?;

        txn.delete_table(ORDERS_TABLE)?;
        txn.delete_table(ACTIVE_CODES_TABLE)?;
        let _ = txn.open_table(ORDERS_TABLE)?;
        let _ = txn.open_table(ACTIVE_CODES_TABLE)?;

        Ok(removed)
    }

    // ========== Active Codes ==========

    /// Check whether a code is held by an active order (within transaction)
    pub fn is_code_active_txn(&self, txn: &WriteTransaction, code: &str) -> StorageResult<bool> {
        let table = txn.open_table(ACTIVE_CODES_TABLE)?;
        Ok(table.get(code)?.is_some())
    }

    /// Bind a code to an order (within transaction)
    pub fn claim_code(
        &self,
        txn: &WriteTransaction,
        code: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(ACTIVE_CODES_TABLE)?;
        table.insert(code, order_id)?;
        Ok(())
    }

    /// Release a code if it is still bound to `order_id` (within transaction)
    pub fn release_code(
        &self,
        txn: &WriteTransaction,
        code: &str,
        order_id: &str,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(ACTIVE_CODES_TABLE)?;
        let owned = table
            .get(code)?
            .is_some_and(|holder| holder.value() == order_id);
        if owned {
            table.remove(code)?;
        }
        Ok(owned)
    }

    /// Get all active orders
    pub fn get_active_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let codes = read_txn.open_table(ACTIVE_CODES_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut active = Vec::new();
        for result in codes.iter()? {
            let (_code, order_id) = result?;
            if let Some(value) = orders.get(order_id.value())? {
                active.push(serde_json::from_slice(value.value())?);
            }
        }

        Ok(active)
    }

    // ========== Inventory ==========

    /// Persist an availability flag
    pub fn set_inventory(&self, product_id: &str, available: bool) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(INVENTORY_TABLE)?;
            table.insert(product_id, available)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// All stored availability flags
    pub fn get_inventory(&self) -> StorageResult<BTreeMap<String, bool>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INVENTORY_TABLE)?;

        let mut flags = BTreeMap::new();
        for result in table.iter()? {
            let (key, value) = result?;
            flags.insert(key.value().to_string(), value.value());
        }

        Ok(flags)
    }

    /// Unknown products are available
    pub fn is_available(&self, product_id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INVENTORY_TABLE)?;
        Ok(table.get(product_id)?.map(|v| v.value()).unwrap_or(true))
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let codes = read_txn.open_table(ACTIVE_CODES_TABLE)?;
        let inventory = read_txn.open_table(INVENTORY_TABLE)?;

        Ok(StorageStats {
            order_count: orders.len()?,
            active_order_count: codes.len()?,
            inventory_count: inventory.len()?,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    pub order_count: u64,
    pub active_order_count: u64,
    pub inventory_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderItem, OrderStatus, ThermalClass};

    fn create_test_order(id: &str, code: &str) -> Order {
        let now = shared::util::now_millis();
        Order {
            id: id.to_string(),
            owner_id: "user-1".to_string(),
            items: vec![OrderItem {
                product_id: "burger".to_string(),
                name: "Burger".to_string(),
                unit_price: 8.5,
                quantity: 1,
                thermal_class: ThermalClass::Hot,
            }],
            total: 8.5,
            status: OrderStatus::Pending,
            code: code.to_string(),
            created_at: now,
            updated_at: now,
            customer_details: None,
        }
    }

    fn store_with_code(storage: &OrderStorage, order: &Order) {
        let txn = storage.begin_write().unwrap();
        storage.store_order(&txn, order).unwrap();
        storage.claim_code(&txn, &order.code, &order.id).unwrap();
        storage.commit(txn).unwrap();
    }

    fn active_ids(storage: &OrderStorage) -> Vec<String> {
        storage
            .get_active_orders()
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect()
    }

    #[test]
    fn test_store_and_get_order() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let order = create_test_order("o1", "1234");
        store_with_code(&storage, &order);

        let loaded = storage.get_order("o1").unwrap().unwrap();
        assert_eq!(loaded.code, "1234");
        assert_eq!(loaded.total, 8.5);
        assert!(storage.get_order("missing").unwrap().is_none());
    }

    #[test]
    fn test_uncommitted_write_is_invisible() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let order = create_test_order("o1", "1234");

        let txn = storage.begin_write().unwrap();
        storage.store_order(&txn, &order).unwrap();
        assert!(storage.get_order_txn(&txn, "o1").unwrap().is_some());
        drop(txn);

        assert!(storage.get_order("o1").unwrap().is_none());
    }

    #[test]
    fn test_code_index() {
        let storage = OrderStorage::open_in_memory().unwrap();
        store_with_code(&storage, &create_test_order("o1", "1234"));
        store_with_code(&storage, &create_test_order("o2", "5678"));

        let txn = storage.begin_write().unwrap();
        assert!(storage.is_code_active_txn(&txn, "1234").unwrap());
        assert!(!storage.is_code_active_txn(&txn, "0000").unwrap());

        // 只释放属于该订单的取餐码
        assert!(!storage.release_code(&txn, "1234", "o2").unwrap());
        assert!(storage.release_code(&txn, "1234", "o1").unwrap());
        storage.commit(txn).unwrap();

        assert_eq!(active_ids(&storage), vec!["o2".to_string()]);
        assert_eq!(storage.get_stats().unwrap().active_order_count, 1);
    }

    #[test]
    fn test_clear_orders() {
        let storage = OrderStorage::open_in_memory().unwrap();
        store_with_code(&storage, &create_test_order("o1", "1234"));
        store_with_code(&storage, &create_test_order("o2", "5678"));

        let txn = storage.begin_write().unwrap();
        assert_eq!(storage.clear_orders(&txn).unwrap(), 2);
        storage.commit(txn).unwrap();

        assert!(storage.get_all_orders().unwrap().is_empty());
        assert!(active_ids(&storage).is_empty());

        // 清空后表仍可用
        store_with_code(&storage, &create_test_order("o3", "1234"));
        assert_eq!(storage.get_stats().unwrap().order_count, 1);
    }

    #[test]
    fn test_inventory_flags() {
        let storage = OrderStorage::open_in_memory().unwrap();
        assert!(storage.is_available("burger").unwrap());

        storage.set_inventory("burger", false).unwrap();
        storage.set_inventory("salad", true).unwrap();

        assert!(!storage.is_available("burger").unwrap());
        let flags = storage.get_inventory().unwrap();
        assert_eq!(flags.get("burger"), Some(&false));
        assert_eq!(flags.get("salad"), Some(&true));
        assert_eq!(storage.get_stats().unwrap().inventory_count, 2);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locker.redb");

        {
            let storage = OrderStorage::open(&path).unwrap();
            store_with_code(&storage, &create_test_order("o1", "4321"));
        }

        let storage = OrderStorage::open(&path).unwrap();
        assert_eq!(storage.get_order("o1").unwrap().unwrap().code, "4321");
        assert_eq!(active_ids(&storage), vec!["o1".to_string()]);
    }
}
