#![allow(dead_code)]

use std::sync::Once;

use chrono::{TimeZone, Utc};
use facturae::core::{FundProvision, Party};
use facturae::lifecycle::{InvoiceService, MemoryStore};
use rust_decimal::Decimal;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,facturae=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const ISSUER: &str = "abogada-1";
pub const RECIPIENT: &str = "cliente-1";

pub const CERT: &str = include_str!("../fixtures/signing_cert.pem");
pub const KEY: &str = include_str!("../fixtures/signing_key.pem");

/// Service over a fresh store holding one issuer and one client, with the
/// clock fixed on 2024-05-10.
pub fn service() -> InvoiceService<MemoryStore> {
    init_tracing();
    let store = MemoryStore::new();
    store
        .insert_party(Party {
            id: ISSUER.into(),
            name: "Despacho Ruiz".into(),
            dni: Some("12345678Z".into()),
            email: Some("ruiz@example.com".into()),
        })
        .unwrap();
    store
        .insert_party(Party {
            id: RECIPIENT.into(),
            name: "Cliente Uno".into(),
            dni: None,
            email: Some("cliente@example.com".into()),
        })
        .unwrap();
    InvoiceService::new(store).with_clock(|| Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap())
}

pub fn add_provision(service: &InvoiceService<MemoryStore>, id: &str, amount: Decimal) {
    service
        .store()
        .insert_provision(FundProvision {
            id: id.into(),
            client_id: RECIPIENT.into(),
            amount,
            description: "Provisión de fondos".into(),
            invoice_id: None,
        })
        .unwrap();
}
