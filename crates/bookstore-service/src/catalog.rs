//! # Catalog Service
//!
//! Book browsing for shoppers and catalog administration.
//!
//! Stock only changes through [`CatalogService::set_stock`] here; orders
//! move it inside their own transactions.

use tracing::{debug, info};

use crate::error::ServiceResult;
use bookstore_core::validation::{
    validate_new_book, validate_search_query, validate_stock, validate_uuid,
};
use bookstore_core::{Book, BookUpdate, CoreError, NewBook, Page, PageRequest};
use bookstore_db::{BookFilter, Database, DbError};

/// Catalog use cases.
#[derive(Debug, Clone)]
pub struct CatalogService {
    db: Database,
}

impl CatalogService {
    pub fn new(db: Database) -> Self {
        CatalogService { db }
    }

    /// Lists books, optionally narrowed by search text and category.
    pub async fn list_books(
        &self,
        search: Option<&str>,
        category: Option<&str>,
        page: PageRequest,
    ) -> ServiceResult<Page<Book>> {
        let search = search.map(validate_search_query).transpose()?;
        let filter = BookFilter {
            search,
            category: category.map(str::to_string),
        };

        Ok(self.db.books().list(&filter, page).await?)
    }

    pub async fn get_book(&self, id: &str) -> ServiceResult<Book> {
        let book = self
            .db
            .books()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::BookNotFound(id.to_string()))?;
        Ok(book)
    }

    pub async fn create_book(&self, input: NewBook) -> ServiceResult<Book> {
        validate_new_book(&input)?;

        let book = self.db.books().insert(&input).await?;
        info!(id = %book.id, title = %book.title, "Book created");
        Ok(book)
    }

    /// Applies a partial update. The merged book must still be valid.
    pub async fn update_book(&self, id: &str, update: BookUpdate) -> ServiceResult<Book> {
        let mut book = self.get_book(id).await?;
        if update.is_empty() {
            return Ok(book);
        }

        update.apply_to(&mut book);
        validate_new_book(&NewBook::from(&book))?;

        self.db
            .books()
            .update(&book)
            .await
            .map_err(|e| book_not_found(e, id))?;

        debug!(id = %id, "Book updated");
        self.get_book(id).await
    }

    /// Sets the on-hand count after a recount or delivery.
    pub async fn set_stock(&self, id: &str, stock: i64) -> ServiceResult<Book> {
        validate_stock(stock)?;

        self.db
            .books()
            .set_stock(id, stock)
            .await
            .map_err(|e| book_not_found(e, id))?;

        info!(id = %id, stock, "Stock set");
        self.get_book(id).await
    }

    pub async fn delete_book(&self, id: &str) -> ServiceResult<()> {
        validate_uuid(id)?;

        self.db
            .books()
            .delete(id)
            .await
            .map_err(|e| book_not_found(e, id))?;

        info!(id = %id, "Book deleted");
        Ok(())
    }
}

fn book_not_found(err: DbError, id: &str) -> DbError {
    match err {
        DbError::NotFound { .. } => CoreError::BookNotFound(id.to_string()).into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use bookstore_core::Money;
    use bookstore_db::DbConfig;

    async fn service() -> CatalogService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        CatalogService::new(db)
    }

    fn new_book(title: &str, author: &str, category: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: author.to_string(),
            isbn: None,
            description: None,
            category: category.to_string(),
            price: Money::from_minor(1299),
            stock: 4,
        }
    }

    #[tokio::test]
    async fn test_create_and_search() {
        let catalog = service().await;
        catalog
            .create_book(new_book("The Dispossessed", "Ursula K. Le Guin", "Science Fiction"))
            .await
            .unwrap();
        catalog
            .create_book(new_book("Persuasion", "Jane Austen", "Classics"))
            .await
            .unwrap();

        let page = catalog
            .list_books(Some("  le guin "), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "The Dispossessed");

        let page = catalog
            .list_books(None, Some("Classics"), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total_items, 1);
    }

    #[tokio::test]
    async fn test_invalid_book_is_rejected() {
        let catalog = service().await;
        let err = catalog
            .create_book(new_book("", "Nobody", "Classics"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let catalog = service().await;
        let book = catalog
            .create_book(new_book("Emma", "Jane Austen", "Classics"))
            .await
            .unwrap();

        let updated = catalog
            .update_book(
                &book.id,
                BookUpdate {
                    price: Some(Money::from_minor(999)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, Money::from_minor(999));
        assert_eq!(updated.stock, 4);
    }

    #[tokio::test]
    async fn test_set_stock_and_missing_books() {
        let catalog = service().await;
        let book = catalog
            .create_book(new_book("Emma", "Jane Austen", "Classics"))
            .await
            .unwrap();

        assert_eq!(catalog.set_stock(&book.id, 12).await.unwrap().stock, 12);
        assert_eq!(
            catalog.set_stock(&book.id, -1).await.unwrap_err().code,
            ErrorCode::ValidationError
        );

        let missing = "00000000-0000-4000-8000-000000000000";
        assert_eq!(
            catalog.set_stock(missing, 3).await.unwrap_err().code,
            ErrorCode::BookNotFound
        );
        assert_eq!(
            catalog.get_book(missing).await.unwrap_err().code,
            ErrorCode::BookNotFound
        );

        catalog.delete_book(&book.id).await.unwrap();
        assert_eq!(
            catalog.delete_book(&book.id).await.unwrap_err().code,
            ErrorCode::BookNotFound
        );
    }
}
