//! Shared helpers for harness integration tests.
//!
//! `admin_page` simulates the admin dashboard: it imports the auth and
//! data-access modules on load, calls the privilege check, renders one table
//! row per product record, and opens the product dialog from the add button.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use comprobar::{
    CatalogFixture, MockDom, MockDriver, MockElement, PageLoad, Scenario, Timeouts,
};
use std::path::Path;

/// Sessions are process-wide; tests that run one take this first.
pub static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

pub const BASE: &str = "http://localhost:3000";
pub const AUTH_JS: &str = "http://localhost:3000/js/services/auth.js";
pub const DB_JS: &str = "http://localhost:3000/js/services/db.js";
pub const ADMIN_JS: &str = "http://localhost:3000/js/admin.js";

/// Number of records declared by a rendered catalog module
pub fn declared_records(body: &str) -> usize {
    body.lines()
        .find(|l| l.starts_with(CatalogFixture::RECORDS_DECL))
        .map(|l| {
            let json = l
                .trim_start_matches(CatalogFixture::RECORDS_DECL)
                .trim_start_matches("Object.freeze(")
                .trim_end_matches(");");
            serde_json::from_str::<Vec<serde_json::Value>>(json)
                .map(|v| v.len())
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

/// Page model for `/html/admin.html`
pub fn admin_page(load: &PageLoad) -> Result<MockDom, String> {
    let auth = load
        .resource("/js/services/auth.js")
        .and_then(|r| r.body.clone());
    let db = load
        .resource("/js/services/db.js")
        .and_then(|r| r.body.clone());

    // Unrouted modules would talk to the live backend; the page stays empty.
    let (Some(auth), Some(db)) = (auth, db) else {
        return Ok(MockDom::new());
    };
    if !auth.contains("checkAdminStatus:") {
        return Err(
            "TypeError: AuthService.checkAdminStatus is not a function".to_string(),
        );
    }
    if !auth.contains("\"isAdmin\":true") {
        return Ok(MockDom::new());
    }

    Ok(MockDom::new()
        .with(MockElement::rows("#productTableBody tr", declared_records(&db)))
        .with(MockElement::new("#addProductBtn").revealing("#productModal"))
        .with(MockElement::new("#productModal").hidden())
        .with(MockElement::input("#brand"))
        .with(MockElement::input("#name")))
}

/// Driver serving the admin page and its scripts
pub fn admin_driver() -> MockDriver {
    MockDriver::new()
        .with_resource(AUTH_JS)
        .with_resource(DB_JS)
        .with_resource(ADMIN_JS)
        .with_screenshot(b"\x89PNG\r\n\x1a\nadmin".to_vec())
        .with_app(admin_page)
}

/// Built-in scenario writing into `dir` with short timeouts
pub fn admin_scenario(dir: &Path) -> Scenario {
    let mut scenario = Scenario::admin_dashboard();
    scenario.artifacts.dir = dir.to_path_buf();
    scenario.timeouts = Timeouts::default().with_step(1_000).with_settle(0);
    scenario
}
