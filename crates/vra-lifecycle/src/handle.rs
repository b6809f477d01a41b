//! Description of one logical remote object.

use reqwest::{Method, StatusCode};

/// The four lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// POST to the create path
    Create,
    /// GET from the read path
    Read,
    /// PUT to the update path
    Update,
    /// DELETE on the delete path
    Delete,
}

const CREATE_CODES: &[StatusCode] = &[StatusCode::OK, StatusCode::CREATED, StatusCode::ACCEPTED];
const READ_CODES: &[StatusCode] = &[StatusCode::OK];
const UPDATE_CODES: &[StatusCode] = &[
    StatusCode::OK,
    StatusCode::CREATED,
    StatusCode::ACCEPTED,
    StatusCode::NO_CONTENT,
];
const DELETE_CODES: &[StatusCode] = &[StatusCode::OK, StatusCode::ACCEPTED, StatusCode::NO_CONTENT];

impl Operation {
    /// HTTP method used for the operation.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Create => Method::POST,
            Self::Read => Method::GET,
            Self::Update => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    /// Success statuses accepted unless a handle overrides them.
    #[must_use]
    pub const fn default_allowed_codes(self) -> &'static [StatusCode] {
        match self {
            Self::Create => CREATE_CODES,
            Self::Read => READ_CODES,
            Self::Update => UPDATE_CODES,
            Self::Delete => DELETE_CODES,
        }
    }

    /// Whether a 404 means "already gone" rather than a failure.
    #[must_use]
    pub const fn tolerates_missing(self) -> bool {
        matches!(self, Self::Read | Self::Delete)
    }

    /// Lowercase verb for logs and diagnostics.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A remote object as the lifecycle client sees it.
///
/// Implemented once per resource variant and built fresh for every call from
/// the resource's current configuration or state. Paths are relative to the
/// API base URL and may carry their own query string.
///
/// `identity_key` must stay stable for the lifetime of one remote object. It
/// is used only to serialize operations on that object and is never sent to
/// the server.
pub trait ResourceHandle: Send + Sync {
    /// Key naming the remote object for locking.
    fn identity_key(&self) -> String;

    /// Path for POST on create.
    fn create_path(&self) -> String;

    /// Path for GET on read.
    fn read_path(&self) -> String;

    /// Path for PUT on update.
    fn update_path(&self) -> String;

    /// Path for DELETE.
    fn delete_path(&self) -> String;

    /// Ask the server to skip its reference checks on delete.
    fn force_delete(&self) -> bool {
        false
    }

    /// Statuses treated as success for `operation`.
    fn allowed_codes(&self, operation: Operation) -> &[StatusCode] {
        operation.default_allowed_codes()
    }

    /// Path for `operation`.
    fn path_for(&self, operation: Operation) -> String {
        match operation {
            Operation::Create => self.create_path(),
            Operation::Read => self.read_path(),
            Operation::Update => self.update_path(),
            Operation::Delete => self.delete_path(),
        }
    }
}

/// Handle with explicit paths, for resources without a dedicated type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHandle {
    identity_key: String,
    create_path: String,
    read_path: String,
    update_path: String,
    delete_path: String,
    force_delete: bool,
}

impl StaticHandle {
    /// Handle whose read, update and delete paths are all `path`, and whose
    /// create path is `path` with its last segment removed.
    #[must_use]
    pub fn new(identity_key: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let collection = path
            .rsplit_once('/')
            .map_or_else(|| path.clone(), |(parent, _)| parent.to_string());

        Self {
            identity_key: identity_key.into(),
            create_path: collection,
            read_path: path.clone(),
            update_path: path.clone(),
            delete_path: path,
            force_delete: false,
        }
    }

    /// Override the create path.
    #[must_use]
    pub fn with_create_path(mut self, path: impl Into<String>) -> Self {
        self.create_path = path.into();
        self
    }

    /// Override the read path.
    #[must_use]
    pub fn with_read_path(mut self, path: impl Into<String>) -> Self {
        self.read_path = path.into();
        self
    }

    /// Override the update path.
    #[must_use]
    pub fn with_update_path(mut self, path: impl Into<String>) -> Self {
        self.update_path = path.into();
        self
    }

    /// Override the delete path.
    #[must_use]
    pub fn with_delete_path(mut self, path: impl Into<String>) -> Self {
        self.delete_path = path.into();
        self
    }

    /// Set the force-delete flag.
    #[must_use]
    pub const fn with_force_delete(mut self, force: bool) -> Self {
        self.force_delete = force;
        self
    }
}

impl ResourceHandle for StaticHandle {
    fn identity_key(&self) -> String {
        self.identity_key.clone()
    }

    fn create_path(&self) -> String {
        self.create_path.clone()
    }

    fn read_path(&self) -> String {
        self.read_path.clone()
    }

    fn update_path(&self) -> String {
        self.update_path.clone()
    }

    fn delete_path(&self) -> String {
        self.delete_path.clone()
    }

    fn force_delete(&self) -> bool {
        self.force_delete
    }
}
