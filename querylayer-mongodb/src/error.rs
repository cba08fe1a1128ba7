//! Classification of MongoDB driver errors.

use mongodb::error::{Error, ErrorKind};

use querylayer_core::error::DocumentStoreError;

// Server codes for IndexOptionsConflict and IndexKeySpecsConflict.
const INDEX_CONFLICT_CODES: [i32; 2] = [85, 86];

/// Maps a driver error onto the store error taxonomy, keeping the driver's message.
pub(crate) fn classify(error: Error) -> DocumentStoreError {
    let message = error.to_string();

    match error.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. } => DocumentStoreError::Connection(message),
        ErrorKind::Command(command) if INDEX_CONFLICT_CODES.contains(&command.code) => {
            DocumentStoreError::IndexConflict(message)
        },
        ErrorKind::Command(_) | ErrorKind::InvalidArgument { .. } => DocumentStoreError::QuerySpec(message),
        _ => DocumentStoreError::Backend(message),
    }
}

/// Whether the error reports a collection that does not exist (NamespaceNotFound).
pub(crate) fn is_namespace_not_found(error: &Error) -> bool {
    matches!(error.kind.as_ref(), ErrorKind::Command(command) if command.code == 26)
}
