//! # Seed Data Generator
//!
//! Populates the catalog with books for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p bookstore-db --bin seed
//!
//! # Repeat each title N times with an edition suffix
//! cargo run -p bookstore-db --bin seed -- --copies 5
//!
//! # Specify database path
//! cargo run -p bookstore-db --bin seed -- --db ./data/bookstore.db
//! ```
//!
//! Each book gets a price between 4.99 and 29.99 and a stock between 0 and
//! 40, derived from its index so reruns on a fresh file produce the same
//! catalog.

use anyhow::Context;
use std::env;
use tracing::{info, warn};

use bookstore_core::{Money, NewBook, PageRequest};
use bookstore_db::{BookFilter, Database, DbConfig};

/// (title, author, category, isbn)
const BOOKS: &[(&str, &str, &str, &str)] = &[
    ("Dune", "Frank Herbert", "Science Fiction", "9780441013593"),
    ("Neuromancer", "William Gibson", "Science Fiction", "9780441569595"),
    ("The Left Hand of Darkness", "Ursula K. Le Guin", "Science Fiction", "9780441478125"),
    ("Foundation", "Isaac Asimov", "Science Fiction", "9780553293357"),
    ("Hyperion", "Dan Simmons", "Science Fiction", "9780553283686"),
    ("Pride and Prejudice", "Jane Austen", "Classics", "9780141439518"),
    ("Emma", "Jane Austen", "Classics", "9780141439587"),
    ("Middlemarch", "George Eliot", "Classics", "9780141439549"),
    ("Moby-Dick", "Herman Melville", "Classics", "9780142437247"),
    ("Great Expectations", "Charles Dickens", "Classics", "9780141439563"),
    ("The Hobbit", "J.R.R. Tolkien", "Fantasy", "9780547928227"),
    ("A Wizard of Earthsea", "Ursula K. Le Guin", "Fantasy", "9780547773742"),
    ("The Name of the Wind", "Patrick Rothfuss", "Fantasy", "9780756404741"),
    ("Mistborn", "Brandon Sanderson", "Fantasy", "9780765350381"),
    ("The Murder of Roger Ackroyd", "Agatha Christie", "Mystery", "9780062073563"),
    ("The Big Sleep", "Raymond Chandler", "Mystery", "9780394758282"),
    ("Gone Girl", "Gillian Flynn", "Mystery", "9780307588371"),
    ("Sapiens", "Yuval Noah Harari", "Non-Fiction", "9780062316097"),
    ("Thinking, Fast and Slow", "Daniel Kahneman", "Non-Fiction", "9780374533557"),
    ("The Pragmatic Programmer", "David Thomas", "Technology", "9780135957059"),
    ("The Rust Programming Language", "Steve Klabnik", "Technology", "9781718503106"),
    ("Palpasa Cafe", "Narayan Wagle", "Nepali Literature", "9789937905016"),
    ("Seto Dharti", "Amar Neupane", "Nepali Literature", "9789937875890"),
    ("Muna Madan", "Laxmi Prasad Devkota", "Nepali Literature", "9789993310113"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut copies: usize = 1;
    let mut db_path = String::from("./data/bookstore.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--copies" | "-c" => {
                if i + 1 < args.len() {
                    copies = args[i + 1].parse().context("--copies expects a number")?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bookstore Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --copies <N>   Editions per title (default: 1)");
                println!("  -d, --db <PATH>    Database file path (default: ./data/bookstore.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;
    info!(path = %db_path, "Connected, migrations applied");

    let existing = db.books().count().await?;
    if existing > 0 {
        warn!(existing, "Catalog already has books, skipping seed (delete the file to regenerate)");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0usize;

    for edition in 0..copies {
        for (index, (title, author, category, isbn)) in BOOKS.iter().enumerate() {
            let seed = edition * BOOKS.len() + index;
            let book = generate_book(title, author, category, isbn, edition, seed);

            match db.books().insert(&book).await {
                Ok(_) => generated += 1,
                Err(e) => warn!(title = %book.title, error = %e, "Failed to insert book"),
            }
        }
    }

    info!(generated, elapsed = ?start.elapsed(), "Catalog seeded");

    let sample = db
        .books()
        .list(
            &BookFilter {
                search: Some("le guin".to_string()),
                category: None,
            },
            PageRequest::default(),
        )
        .await?;
    info!(matches = sample.pagination.total_items, "Search 'le guin'");

    db.close().await;
    Ok(())
}

fn generate_book(
    title: &str,
    author: &str,
    category: &str,
    isbn: &str,
    edition: usize,
    seed: usize,
) -> NewBook {
    // 4.99 .. 29.99
    let price = Money::from_minor(499 + ((seed * 337) % 2501) as i64);
    let stock = (seed * 7 % 41) as i64;

    // ISBNs must stay unique across editions
    let (title, isbn) = if edition == 0 {
        (title.to_string(), Some(isbn.to_string()))
    } else {
        (format!("{title} (Edition {})", edition + 1), None)
    };

    NewBook {
        title,
        author: author.to_string(),
        isbn,
        description: None,
        category: category.to_string(),
        price,
        stock,
    }
}
