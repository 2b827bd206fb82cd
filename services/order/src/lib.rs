use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, Utc};

use ecommerce_common::confidentiality::AbstractConfidentiality;
use ecommerce_common::config::AppConfig;
use ecommerce_common::logging::AppLogContext;

pub mod api;
pub mod constant;
pub mod error;
pub mod model;
pub mod repository;
pub mod usecase;

mod adapter;
pub use adapter::datastore;
pub use adapter::gateway;

use crate::constant::{ID_EPOCH_MILLIS, ORDER_NUMBER_DATE_FMT};
use crate::error::AppError;
use crate::gateway::AbstractPaymentGateway;

pub struct AppDataStoreContext {
    pub in_mem: Option<Arc<Box<dyn datastore::AbstInMemoryDStore>>>,
    pub sql_dbs: Option<Vec<Arc<datastore::AppMariaDbStore>>>,
}

/// Generator of entity identifiers, layout from the most significant bit :
/// - 41 bits, milliseconds since custom epoch
/// - 8 bits, machine code
/// - 14 bits, sequence within the same millisecond
///
/// Generated values exceed 2^53 shortly after the epoch, clients have to
/// keep them as decimal strings.
pub struct AppIdGenerator {
    machine_code: u8,
    last: Mutex<(i64, u16)>,
}

const ID_SEQ_BITS: u32 = 14;
const ID_SEQ_MASK: u16 = (1u16 << ID_SEQ_BITS) - 1;
const ID_SEQ_START_MASK: u16 = 0xff;

impl AppIdGenerator {
    pub fn new(machine_code: u8) -> Self {
        Self {
            machine_code,
            last: Mutex::new((0, 0)),
        }
    }

    pub fn next_id(&self) -> u64 {
        let mut guard = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut millis = (Utc::now().timestamp_millis() - ID_EPOCH_MILLIS).max(0);
        let (last_millis, last_seq) = *guard;
        // clock going backwards reuses the latest timestamp
        if millis <= last_millis {
            millis = last_millis;
            let seq = (last_seq + 1) & ID_SEQ_MASK;
            if seq == 0 {
                millis += 1; // sequence exhausted, borrow next millisecond
            }
            *guard = (millis, seq);
        } else {
            // random start of the sequence in each millisecond lowers collision
            // chance among nodes misconfigured with the same machine code
            let seq = rand::random::<u16>() & ID_SEQ_START_MASK;
            *guard = (millis, seq);
        }
        let (millis, seq) = *guard;
        ((millis as u64) << 22) | ((self.machine_code as u64) << ID_SEQ_BITS) | (seq as u64)
    }

    /// Human-readable order number, date of creation followed by a
    /// base-36 form of a freshly generated identifier.
    pub fn order_number(&self, now: DateTime<FixedOffset>) -> String {
        const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let mut n = self.next_id();
        let mut suffix = Vec::new();
        while n > 0 {
            suffix.push(DIGITS[(n % 36) as usize]);
            n /= 36;
        }
        suffix.reverse();
        let suffix = String::from_utf8(suffix).unwrap_or_default();
        format!("{}-{}", now.format(ORDER_NUMBER_DATE_FMT), suffix)
    }
} // end of impl AppIdGenerator

// global state shared by all threads
#[derive(Clone)]
pub struct AppSharedState {
    _cfg: Arc<AppConfig>,
    _log: Arc<AppLogContext>,
    _dstore: Arc<AppDataStoreContext>,
    _gateway: Arc<Box<dyn AbstractPaymentGateway>>,
    _id_gen: Arc<AppIdGenerator>,
}

impl AppSharedState {
    pub fn new(
        cfg: AppConfig,
        log: AppLogContext,
        confidential: Box<dyn AbstractConfidentiality>,
    ) -> DefaultResult<Self, AppError> {
        let confidential = Arc::new(confidential);
        let log = Arc::new(log);
        let (in_mem, sql_dbs) = datastore::build_context(
            log.clone(),
            &cfg.service.data_store,
            confidential.clone(),
        );
        let in_mem = in_mem.map(Arc::new);
        let sql_dbs = sql_dbs.map(|m| m.into_iter().map(Arc::new).collect());
        let ds_ctx = Arc::new(AppDataStoreContext { in_mem, sql_dbs });
        let gw = gateway::app_gateway_context(&cfg.service.payment_gateway, log.clone(), confidential)?;
        let id_gen = AppIdGenerator::new(cfg.service.checkout.machine_code);
        Ok(Self {
            _cfg: Arc::new(cfg),
            _log: log,
            _dstore: ds_ctx,
            _gateway: Arc::new(gw),
            _id_gen: Arc::new(id_gen),
        })
    } // end of fn new

    pub fn config(&self) -> &Arc<AppConfig> {
        &self._cfg
    }

    pub fn log_context(&self) -> &Arc<AppLogContext> {
        &self._log
    }

    pub fn datastore(&self) -> Arc<AppDataStoreContext> {
        self._dstore.clone()
    }

    pub fn gateway(&self) -> Arc<Box<dyn AbstractPaymentGateway>> {
        self._gateway.clone()
    }

    pub fn id_generator(&self) -> Arc<AppIdGenerator> {
        self._id_gen.clone()
    }
} // end of impl AppSharedState
