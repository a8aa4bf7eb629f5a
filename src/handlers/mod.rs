pub mod common;
pub mod customers;
pub mod invoices;
pub mod parts;
pub mod users;
pub mod vehicles;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub invoices: Arc<crate::services::invoices::InvoiceService>,
    pub parts: Arc<crate::services::parts::PartService>,
    pub customers: Arc<crate::services::customers::CustomerService>,
    pub vehicles: Arc<crate::services::vehicles::VehicleService>,
    pub users: Arc<crate::services::users::UserService>,
}

impl AppServices {
    /// Build the AppServices container shared by all handlers.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let invoices = Arc::new(crate::services::invoices::InvoiceService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let parts = Arc::new(crate::services::parts::PartService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let customers = Arc::new(crate::services::customers::CustomerService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let vehicles = Arc::new(crate::services::vehicles::VehicleService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let users = Arc::new(crate::services::users::UserService::new(
            db_pool,
            Some(event_sender),
        ));

        Self {
            invoices,
            parts,
            customers,
            vehicles,
            users,
        }
    }
}
