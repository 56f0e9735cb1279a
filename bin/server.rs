// Expense Dashboard - Web Server
// JSON API over the local expense store

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

use expense_dashboard::aggregate::{Choice, DashboardView, ExpenseFilter, PaidFilter};
use expense_dashboard::config::{Backend, Config};
use expense_dashboard::expense::{Expense, ExpenseForm};
use expense_dashboard::month::YearMonth;
use expense_dashboard::store::{ExpenseBackend, LocalStore};
use expense_dashboard::{month_bucket, month_index, telemetry, Error};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Box<dyn ExpenseBackend>>>,
    current: YearMonth,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

fn storage_error(err: Error) -> Response {
    tracing::error!(error = %err, "store operation failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn lock_store(state: &AppState) -> Result<MutexGuard<'_, Box<dyn ExpenseBackend>>, Response> {
    state
        .store
        .lock()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "store lock poisoned"))
}

fn load_all(state: &AppState) -> Result<Vec<Expense>, Response> {
    lock_store(state)?.fetch_all().map_err(storage_error)
}

/// Query string shared by the month views
#[derive(Debug, Default, Deserialize)]
struct ExpenseQuery {
    month: Option<String>,
    q: Option<String>,
    category: Option<String>,
    method: Option<String>,
    status: Option<String>,
}

fn blank_or_all(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl ExpenseQuery {
    fn month(&self, current: YearMonth) -> Result<YearMonth, Response> {
        match blank_or_all(&self.month) {
            None => Ok(current),
            Some(raw) => raw
                .parse()
                .map_err(|err: expense_dashboard::ValidationError| {
                    api_error(StatusCode::BAD_REQUEST, err.to_string())
                }),
        }
    }

    fn filter(&self) -> Result<ExpenseFilter, Response> {
        let bad_request = |err: expense_dashboard::ValidationError| {
            api_error(StatusCode::BAD_REQUEST, err.to_string())
        };

        let category = match blank_or_all(&self.category) {
            None => Choice::All,
            Some(raw) => Choice::Only(raw.parse().map_err(bad_request)?),
        };
        let payment_method = match blank_or_all(&self.method) {
            None => Choice::All,
            Some(raw) => Choice::Only(raw.parse().map_err(bad_request)?),
        };
        let status = match blank_or_all(&self.status).map(str::to_ascii_lowercase).as_deref() {
            None => PaidFilter::All,
            Some("paid") => PaidFilter::Paid,
            Some("pending") => PaidFilter::Pending,
            Some(other) => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    format!("status must be all, paid or pending, got {:?}", other),
                ))
            }
        };

        Ok(ExpenseFilter {
            query: self.q.clone().unwrap_or_default(),
            category,
            payment_method,
            status,
        })
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/months - Selectable months, newest first
async fn get_months(State(state): State<AppState>) -> Response {
    let expenses = match load_all(&state) {
        Ok(expenses) => expenses,
        Err(response) => return response,
    };

    let months: Vec<String> = month_index(&expenses, state.current)
        .into_iter()
        .map(|m| m.to_string())
        .collect();
    (StatusCode::OK, Json(ApiResponse::ok(months))).into_response()
}

/// GET /api/dashboard?month= - KPIs, charts and rows for one month
async fn get_dashboard(State(state): State<AppState>, Query(query): Query<ExpenseQuery>) -> Response {
    let build = || -> Result<DashboardView, Response> {
        let month = query.month(state.current)?;
        let filter = query.filter()?;
        let expenses = load_all(&state)?;
        Ok(DashboardView::build(&expenses, month, state.current, &filter))
    };

    match build() {
        Ok(view) => (StatusCode::OK, Json(ApiResponse::ok(view))).into_response(),
        Err(response) => response,
    }
}

/// GET /api/expenses?month=&q=&category=&method=&status= - Filtered month rows
async fn get_expenses(State(state): State<AppState>, Query(query): Query<ExpenseQuery>) -> Response {
    let rows = || -> Result<Vec<Expense>, Response> {
        let month = query.month(state.current)?;
        let filter = query.filter()?;
        let expenses = load_all(&state)?;
        let bucket = month_bucket(&expenses, month);
        Ok(filter.apply(&bucket).into_iter().cloned().collect())
    };

    match rows() {
        Ok(rows) => (StatusCode::OK, Json(ApiResponse::ok(rows))).into_response(),
        Err(response) => response,
    }
}

/// POST /api/expenses - Validate and store a new expense
async fn create_expense(State(state): State<AppState>, Json(form): Json<ExpenseForm>) -> Response {
    let new = match form.validate() {
        Ok(new) => new,
        Err(err) => return api_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    };
    let expense = Expense::create(new);

    let mut store = match lock_store(&state) {
        Ok(store) => store,
        Err(response) => return response,
    };
    if let Err(err) = store.insert(&expense) {
        return storage_error(err);
    }

    tracing::info!(id = %expense.id, "expense created");
    (StatusCode::CREATED, Json(ApiResponse::ok(expense))).into_response()
}

/// POST /api/expenses/:id/toggle-paid - Flip the paid flag
async fn toggle_paid(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let mut store = match lock_store(&state) {
        Ok(store) => store,
        Err(response) => return response,
    };

    let mut expense = match store.fetch_all() {
        Ok(all) => match all.into_iter().find(|e| e.id == id) {
            Some(expense) => expense,
            None => return api_error(StatusCode::NOT_FOUND, Error::NotFound(id).to_string()),
        },
        Err(err) => return storage_error(err),
    };

    expense.paid = !expense.paid;
    if let Err(err) = store.set_paid(&id, expense.paid) {
        return storage_error(err);
    }

    (StatusCode::OK, Json(ApiResponse::ok(expense))).into_response()
}

/// DELETE /api/expenses/:id - Remove an expense; unknown ids are a no-op
async fn delete_expense(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let mut store = match lock_store(&state) {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.delete(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => storage_error(err),
    }
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/months", get(get_months))
        .route("/dashboard", get(get_dashboard))
        .route("/expenses", get(get_expenses).post(create_expense))
        .route("/expenses/:id/toggle-paid", post(toggle_paid))
        .route("/expenses/:id", axum::routing::delete(delete_expense))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("reading configuration")?;
    telemetry::init_stderr();

    println!("🌐 Expense Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config.backend == Backend::Remote {
        tracing::warn!("the API server always serves the local store");
    }

    let db_path = config.local_db();
    let store = LocalStore::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;
    println!("✓ Store opened: {}", db_path.display());

    let state = AppState {
        store: Arc::new(Mutex::new(Box::new(store))),
        current: YearMonth::current(),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;

    println!("\n🚀 Server running on http://{}", config.addr);
    println!("   API: http://{}/api/dashboard", config.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
