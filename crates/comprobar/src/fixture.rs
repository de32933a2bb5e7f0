//! Fixture Library
//!
//! Hand-authored stand-ins for backend-facing modules. Each fixture is built
//! once, never mutated, and turned into exactly one [`RouteRule`].
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: Every operation of a faked module resolves against the same principal
//! - **Heijunka**: Fixed, ordered records give the same rendering on every run

use crate::network::{Interceptor, RouteRule, SyntheticResponse, UrlPattern};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named, immutable substitute for one backend dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    name: String,
    pattern: UrlPattern,
    response: SyntheticResponse,
}

impl Fixture {
    /// Create a fixture from a fully built response
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: UrlPattern, response: SyntheticResponse) -> Self {
        Self {
            name: name.into(),
            pattern,
            response,
        }
    }

    /// Logical service name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL pattern of the endpoint this fixture replaces
    #[must_use]
    pub const fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    /// Response served in place of the real endpoint
    #[must_use]
    pub const fn response(&self) -> &SyntheticResponse {
        &self.response
    }

    /// Body as text
    #[must_use]
    pub fn body(&self) -> String {
        self.response.body_string()
    }

    /// Interception rule for this fixture
    #[must_use]
    pub fn route_rule(&self) -> RouteRule {
        RouteRule::new(self.name.clone(), self.pattern.clone(), self.response.clone())
    }
}

/// Fixtures keyed by logical service name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FixtureLibrary {
    fixtures: Vec<Fixture>,
}

impl FixtureLibrary {
    /// Create an empty library
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixture; names must be unique
    pub fn insert(&mut self, fixture: Fixture) -> HarnessResult<()> {
        if self.get(fixture.name()).is_some() {
            return Err(HarnessError::Fixture {
                message: format!("duplicate fixture name '{}'", fixture.name()),
            });
        }
        self.fixtures.push(fixture);
        Ok(())
    }

    /// Builder-style insert
    pub fn with(mut self, fixture: Fixture) -> HarnessResult<Self> {
        self.insert(fixture)?;
        Ok(self)
    }

    /// Look up a fixture by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.name == name)
    }

    /// All fixtures in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.iter()
    }

    /// Number of fixtures
    #[must_use]
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// Whether the library is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Build an interceptor with one rule per fixture
    #[must_use]
    pub fn interceptor(&self) -> Interceptor {
        let mut interceptor = Interceptor::new();
        for fixture in &self.fixtures {
            interceptor.register_route(fixture.route_rule());
        }
        interceptor
    }
}

// =============================================================================
// AUTHENTICATION FIXTURE
// =============================================================================

/// Operations the UI can invoke on the authentication module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOperation {
    /// Create an account
    SignUp,
    /// Sign in
    Login,
    /// Sign out
    Logout,
    /// Subscribe to auth state changes
    ObserveAuth,
    /// Ask whether the principal holds admin privileges
    CheckAdminStatus,
}

impl AuthOperation {
    /// Every operation the real module exposes
    pub const ALL: [Self; 5] = [
        Self::SignUp,
        Self::Login,
        Self::Logout,
        Self::ObserveAuth,
        Self::CheckAdminStatus,
    ];

    /// Exported function name
    #[must_use]
    pub const fn export_name(&self) -> &'static str {
        match self {
            Self::SignUp => "signUp",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::ObserveAuth => "observeAuth",
            Self::CheckAdminStatus => "checkAdminStatus",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::SignUp => "signUp: async () => ({ user: principal, error: null })",
            Self::Login => "login: async () => ({ user: principal, error: null })",
            Self::Logout => "logout: async () => ({ success: true, error: null })",
            Self::ObserveAuth => "observeAuth: (callback) => { callback(principal); }",
            Self::CheckAdminStatus => "checkAdminStatus: async () => PRINCIPAL.isAdmin",
        }
    }
}

/// The single synthetic identity every auth operation resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Account email
    pub email: String,
    /// Stable user id
    #[serde(default = "default_uid")]
    pub uid: String,
    /// Admin privilege flag
    #[serde(default)]
    pub is_admin: bool,
}

fn default_uid() -> String {
    "fixture-uid".to_string()
}

impl Principal {
    /// Admin principal
    #[must_use]
    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            uid: default_uid(),
            is_admin: true,
        }
    }

    /// Non-admin principal
    #[must_use]
    pub fn user(email: impl Into<String>) -> Self {
        Self {
            is_admin: false,
            ..Self::admin(email)
        }
    }
}

/// Builder for the authentication module fixture
#[derive(Debug, Clone)]
pub struct AuthFixture {
    name: String,
    pattern: UrlPattern,
    principal: Principal,
    operations: BTreeSet<AuthOperation>,
}

impl AuthFixture {
    /// Default export name of the module
    pub const EXPORT: &'static str = "AuthService";

    /// Auth fixture exposing every operation
    #[must_use]
    pub fn new(pattern: UrlPattern, principal: Principal) -> Self {
        Self {
            name: "auth".to_string(),
            pattern,
            principal,
            operations: AuthOperation::ALL.into_iter().collect(),
        }
    }

    /// Override the logical name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Drop one operation from the module surface
    #[must_use]
    pub fn without(mut self, op: AuthOperation) -> Self {
        let _ = self.operations.remove(&op);
        self
    }

    /// Operations that will be exported
    #[must_use]
    pub fn operations(&self) -> Vec<AuthOperation> {
        self.operations.iter().copied().collect()
    }

    /// Render the ES module source
    pub fn render(&self) -> HarnessResult<String> {
        let principal = serde_json::to_string(&self.principal)?;
        let ops = self
            .operations
            .iter()
            .map(|op| format!("  {},", op.source()))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!(
            "const PRINCIPAL = {principal};\n\
             const principal = {{\n\
             \x20 ...PRINCIPAL,\n\
             \x20 getIdTokenResult: async () => ({{ claims: {{ isAdmin: PRINCIPAL.isAdmin }} }}),\n\
             }};\n\
             \n\
             export const {export} = {{\n{ops}\n}};\n",
            export = Self::EXPORT,
        ))
    }

    /// Build the immutable fixture
    pub fn build(self) -> HarnessResult<Fixture> {
        let body = self.render()?;
        Ok(Fixture::new(
            self.name,
            self.pattern,
            SyntheticResponse::javascript(body),
        ))
    }
}

// =============================================================================
// CATALOG (DATA ACCESS) FIXTURE
// =============================================================================

/// Record identifier: numeric for seeded records, string for generated ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric id
    Number(u64),
    /// Generated string id
    Text(String),
}

/// One product row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Record id
    pub id: RecordId,
    /// Brand name
    pub brand: String,
    /// Product name
    pub name: String,
    /// Price
    pub price: f64,
    /// Image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl ProductRecord {
    /// Create a record
    #[must_use]
    pub fn new(id: RecordId, brand: &str, name: &str, price: f64) -> Self {
        Self {
            id,
            brand: brand.to_string(),
            name: name.to_string(),
            price,
            img: None,
        }
    }

    /// Set the image URL
    #[must_use]
    pub fn with_img(mut self, img: &str) -> Self {
        self.img = Some(img.to_string());
        self
    }
}

/// Operations the UI can invoke on the data-access module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOperation {
    /// List every product
    GetAllProducts,
    /// Fetch one product
    GetProductById,
    /// Create a product
    AddProduct,
    /// Update a product
    UpdateProduct,
    /// Delete a product
    DeleteProduct,
    /// Upload a product image
    UploadProductImage,
    /// Bulk-seed products
    SeedProducts,
    /// Persist a user's cart
    SaveUserCart,
    /// Load a user's cart
    GetUserCart,
}

impl DataOperation {
    /// Every operation the real module exposes
    pub const ALL: [Self; 9] = [
        Self::GetAllProducts,
        Self::GetProductById,
        Self::AddProduct,
        Self::UpdateProduct,
        Self::DeleteProduct,
        Self::UploadProductImage,
        Self::SeedProducts,
        Self::SaveUserCart,
        Self::GetUserCart,
    ];

    /// Exported function name
    #[must_use]
    pub const fn export_name(&self) -> &'static str {
        match self {
            Self::GetAllProducts => "getAllProducts",
            Self::GetProductById => "getProductById",
            Self::AddProduct => "addProduct",
            Self::UpdateProduct => "updateProduct",
            Self::DeleteProduct => "deleteProduct",
            Self::UploadProductImage => "uploadProductImage",
            Self::SeedProducts => "seedProducts",
            Self::SaveUserCart => "saveUserCart",
            Self::GetUserCart => "getUserCart",
        }
    }

    /// Whether the operation writes (and is therefore acknowledged, not applied)
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(
            self,
            Self::GetAllProducts | Self::GetProductById | Self::GetUserCart
        )
    }

    fn source(self) -> &'static str {
        match self {
            Self::GetAllProducts => "getAllProducts: async () => RECORDS.map((r) => ({ ...r }))",
            Self::GetProductById => {
                "getProductById: async (id) => {\n    \
                 const found = RECORDS.find((r) => String(r.id) === String(id));\n    \
                 return found ? { ...found } : null;\n  }"
            }
            Self::AddProduct => "addProduct: async (data) => ({ id: ACK_ID, ...data })",
            Self::UpdateProduct => "updateProduct: async (id, data) => ({ id, ...data })",
            Self::DeleteProduct => "deleteProduct: async () => true",
            Self::UploadProductImage => "uploadProductImage: async () => UPLOAD_URL",
            Self::SeedProducts => "seedProducts: async () => undefined",
            Self::SaveUserCart => "saveUserCart: async () => undefined",
            Self::GetUserCart => "getUserCart: async () => []",
        }
    }
}

/// Builder for the data-access module fixture
#[derive(Debug, Clone)]
pub struct CatalogFixture {
    name: String,
    pattern: UrlPattern,
    records: Vec<ProductRecord>,
    upload_url: String,
    operations: BTreeSet<DataOperation>,
}

impl CatalogFixture {
    /// Default export name of the module
    pub const EXPORT: &'static str = "DBService";

    /// Prefix of the line that declares the record list in the rendered module
    pub const RECORDS_DECL: &'static str = "const RECORDS = ";

    /// Catalog fixture exposing every operation
    #[must_use]
    pub fn new(pattern: UrlPattern, records: Vec<ProductRecord>) -> Self {
        Self {
            name: "catalog".to_string(),
            pattern,
            records,
            upload_url: "/img/upload.png".to_string(),
            operations: DataOperation::ALL.into_iter().collect(),
        }
    }

    /// Override the logical name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// URL returned by the upload acknowledgement
    #[must_use]
    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    /// Drop one operation from the module surface
    #[must_use]
    pub fn without(mut self, op: DataOperation) -> Self {
        let _ = self.operations.remove(&op);
        self
    }

    /// Records served by the read operations
    #[must_use]
    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    /// Render the ES module source
    pub fn render(&self) -> HarnessResult<String> {
        let records = serde_json::to_string(&self.records)?;
        let upload = serde_json::to_string(&self.upload_url)?;
        let ops = self
            .operations
            .iter()
            .map(|op| format!("  {},", op.source()))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!(
            "{decl}Object.freeze({records});\n\
             const UPLOAD_URL = {upload};\n\
             const ACK_ID = \"fixture-ack\";\n\
             \n\
             export const {export} = {{\n{ops}\n}};\n",
            decl = Self::RECORDS_DECL,
            export = Self::EXPORT,
        ))
    }

    /// Build the immutable fixture
    pub fn build(self) -> HarnessResult<Fixture> {
        let body = self.render()?;
        Ok(Fixture::new(
            self.name,
            self.pattern,
            SyntheticResponse::javascript(body),
        ))
    }
}
