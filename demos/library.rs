//! Library demo: book CRUD over an in-memory store.
//!
//! Run with:
//!   cargo run --example library -- --config library.toml
//!
//! Try:
//!   curl 'http://localhost:3000/books?page=1&limit=10'
//!   curl -X POST http://localhost:3000/books \
//!        -H 'content-type: application/json' \
//!        -d '{"title":"Dune","author":"Frank Herbert","publisher":"Chilton","genre":"sf",
//!             "isbnNo":"9780441013593","numofPages":412,"totalNumberOfCopies":3}'
//!   curl 'http://localhost:3000/books?id=1'
//!   curl -X DELETE 'http://localhost:3000/books?id=1'

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stacks::middleware::{Cors, JsonBody, Middleware, RequestLog, SetHeader, from_fn};
use stacks::validate::{self, Validate, ValidationError, validated};
use stacks::{Config, Context, Error, Flow, Router, Server, StatusCode};

#[derive(Parser)]
#[command(about = "Serve the library book API")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookDraft {
    title: String,
    author: String,
    publisher: String,
    genre: String,
    isbn_no: String,
    numof_pages: u32,
    total_number_of_copies: u32,
}

impl Validate for BookDraft {
    fn validate(payload: &Value) -> Result<Self, ValidationError> {
        let draft: BookDraft = validate::from_json(payload)?;
        if draft.title.trim().is_empty() || draft.author.trim().is_empty() {
            return Err(ValidationError::new("Invalid book data format"));
        }
        Ok(draft)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Book {
    id: u32,
    #[serde(flatten)]
    draft: BookDraft,
    available_number_of_copies: u32,
}

#[derive(Default)]
struct Shelf {
    books: Mutex<BTreeMap<u32, Book>>,
}

impl Shelf {
    fn create(&self, draft: BookDraft) -> Book {
        let mut books = self.books.lock().unwrap_or_else(|e| e.into_inner());
        let id = books.keys().next_back().map_or(1, |last| last + 1);
        let book = Book {
            id,
            available_number_of_copies: draft.total_number_of_copies,
            draft,
        };
        books.insert(id, book.clone());
        book
    }

    fn get(&self, id: u32) -> Option<Book> {
        self.books.lock().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
    }

    fn page(&self, limit: usize, offset: usize) -> Value {
        let books = self.books.lock().unwrap_or_else(|e| e.into_inner());
        let items: Vec<&Book> = books.values().skip(offset).take(limit).collect();
        json!({ "items": items, "pagination": { "offset": offset, "limit": limit, "total": books.len() } })
    }

    fn update(&self, id: u32, draft: BookDraft) -> Option<Book> {
        let mut books = self.books.lock().unwrap_or_else(|e| e.into_inner());
        let book = books.get_mut(&id)?;
        book.draft = draft;
        Some(book.clone())
    }

    fn delete(&self, id: u32) -> Option<Book> {
        self.books.lock().unwrap_or_else(|e| e.into_inner()).remove(&id)
    }
}

/// Parses `?id=` or answers 400.
fn book_id(ctx: &mut Context) -> Result<u32, Flow> {
    match ctx.query_param("id").map(|raw| raw.parse::<u32>()) {
        Some(Ok(id)) => Ok(id),
        _ => Err(ctx.response().error(StatusCode::BAD_REQUEST, "Valid book ID is required")),
    }
}

fn list_books(shelf: Arc<Shelf>) -> impl Middleware {
    from_fn(move |ctx, _next| {
        let shelf = Arc::clone(&shelf);
        Box::pin(async move {
            if ctx.query_param("id").is_some() {
                let id = match book_id(ctx) {
                    Ok(id) => id,
                    Err(flow) => return flow,
                };
                return match shelf.get(id) {
                    Some(book) => ctx.response().json(StatusCode::OK, &book),
                    None => ctx.response().error(StatusCode::NOT_FOUND, "Book not found"),
                };
            }

            let page = ctx.query_param("page").and_then(|p| p.parse::<usize>().ok()).unwrap_or(1).max(1);
            let limit = ctx.query_param("limit").and_then(|l| l.parse::<usize>().ok()).unwrap_or(10);
            let offset = (page - 1) * limit;
            info!(page, limit, offset, "listing books");
            ctx.response().json(StatusCode::OK, &shelf.page(limit, offset))
        })
    })
}

fn create_book(shelf: Arc<Shelf>) -> impl Middleware {
    from_fn(move |ctx, next| {
        let shelf = Arc::clone(&shelf);
        Box::pin(async move {
            let Some(draft) = ctx.extensions().get::<BookDraft>().cloned() else {
                return next.fail(Error::msg("book draft was not validated"));
            };
            let book = shelf.create(draft);
            info!(id = book.id, "book created");
            ctx.response().json(StatusCode::CREATED, &book)
        })
    })
}

fn update_book(shelf: Arc<Shelf>) -> impl Middleware {
    from_fn(move |ctx, next| {
        let shelf = Arc::clone(&shelf);
        Box::pin(async move {
            let id = match book_id(ctx) {
                Ok(id) => id,
                Err(flow) => return flow,
            };
            let Some(draft) = ctx.extensions().get::<BookDraft>().cloned() else {
                return next.fail(Error::msg("book draft was not validated"));
            };
            match shelf.update(id, draft) {
                Some(book) => ctx.response().json(StatusCode::OK, &book),
                None => ctx.response().error(StatusCode::NOT_FOUND, "Book not found"),
            }
        })
    })
}

fn delete_book(shelf: Arc<Shelf>) -> impl Middleware {
    from_fn(move |ctx, _next| {
        let shelf = Arc::clone(&shelf);
        Box::pin(async move {
            let id = match book_id(ctx) {
                Ok(id) => id,
                Err(flow) => return flow,
            };
            match shelf.delete(id) {
                Some(book) => ctx.response().json(
                    StatusCode::OK,
                    &json!({ "message": "Book deleted successfully", "book": book }),
                ),
                None => ctx.response().error(StatusCode::NOT_FOUND, "Book not found"),
            }
        })
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let shelf = Arc::new(Shelf::default());
    let app = Router::new()
        .global(RequestLog)
        .global(SetHeader::new("x-powered-by", "stacks"))
        .global_scoped("books", Cors::any())
        .global(JsonBody::from_config(&config))
        .get("/books", list_books(Arc::clone(&shelf)))
        .post("/books", validated::<BookDraft>())
        .post("/books", create_book(Arc::clone(&shelf)))
        .patch("/books", validated::<BookDraft>())
        .patch("/books", update_book(Arc::clone(&shelf)))
        .delete("/books", delete_book(shelf));

    Server::from_config(&config).serve(app).await
}
