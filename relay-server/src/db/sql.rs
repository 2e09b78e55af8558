//! SQL query constants for database operations
//!
//! Parameters are bound positionally in the order listed.

// ========================================================================
// Client Queries
// ========================================================================

/// Insert a client
///
/// **Parameters:**
/// 1. `login: &str`
/// 2. `password_hash: &str` - Argon2id PHC string
/// 3. `info: &str`
/// 4. `auth_salt: &str`
/// 5. `auth_key: &[u8]`
/// 6. `created_at: i64`
pub const SQL_INSERT_CLIENT: &str = "INSERT INTO clients (login, password_hash, info, auth_salt, auth_key, created_at) VALUES (?, ?, ?, ?, ?, ?)";

/// **Returns:** `(id, login, password_hash, info, created_at)`
///
/// **Note:** Exact, case-sensitive match.
pub const SQL_SELECT_CLIENT_BY_LOGIN: &str =
    "SELECT id, login, password_hash, info, created_at FROM clients WHERE login = ?";

/// **Returns:** `(password_hash)`
pub const SQL_SELECT_PASSWORD_HASH: &str = "SELECT password_hash FROM clients WHERE login = ?";

/// **Returns:** `(id, auth_salt, auth_key)`
pub const SQL_SELECT_AUTH_MATERIAL: &str =
    "SELECT id, auth_salt, auth_key FROM clients WHERE login = ?";

/// **Returns:** `(id)`
pub const SQL_SELECT_CLIENT_ID: &str = "SELECT id FROM clients WHERE login = ?";

/// **Returns:** `(login)` for every client, alphabetically
pub const SQL_SELECT_ALL_LOGINS: &str = "SELECT login FROM clients ORDER BY login";

/// Rewrite a client's password and derived key together
///
/// **Parameters:**
/// 1. `password_hash: &str`
/// 2. `auth_salt: &str`
/// 3. `auth_key: &[u8]`
/// 4. `login: &str`
pub const SQL_UPDATE_CLIENT_PASSWORD: &str =
    "UPDATE clients SET password_hash = ?, auth_salt = ?, auth_key = ? WHERE login = ?";

// ========================================================================
// Login History Queries
// ========================================================================

/// **Parameters:**
/// 1. `login_time: i64` - Unix milliseconds
/// 2. `ip_address: &str`
/// 3. `login: &str`
///
/// **Note:** Inserts nothing when the login is unknown.
pub const SQL_INSERT_HISTORY: &str = "INSERT INTO client_history (client_id, login_time, ip_address) SELECT id, ?, ? FROM clients WHERE login = ?";

/// **Returns:** `(id, login_time, ip_address)`, oldest first
pub const SQL_SELECT_HISTORY_FOR_LOGIN: &str = "SELECT h.id, h.login_time, h.ip_address FROM client_history h JOIN clients c ON c.id = h.client_id WHERE c.login = ? ORDER BY h.login_time, h.id";

// ========================================================================
// Contact Queries
// ========================================================================

/// **Parameters:**
/// 1. `owner_id: i64`
/// 2. `client_id: i64`
///
/// **Note:** Ignored when the pair already exists; check rows affected.
pub const SQL_INSERT_CONTACT: &str =
    "INSERT OR IGNORE INTO contact_list (owner_id, client_id) VALUES (?, ?)";

/// **Parameters:**
/// 1. `owner_id: i64`
/// 2. `client_id: i64`
pub const SQL_DELETE_CONTACT: &str = "DELETE FROM contact_list WHERE owner_id = ? AND client_id = ?";

/// **Returns:** `(login)` of each contact, in the order they were added
pub const SQL_SELECT_CONTACTS: &str = "SELECT c.login FROM contact_list l JOIN clients c ON c.id = l.client_id WHERE l.owner_id = ? ORDER BY l.id";

// ========================================================================
// Message Queries
// ========================================================================

/// **Parameters:**
/// 1. `sender: &str`
/// 2. `receiver: &str` - empty for broadcasts
/// 3. `body: &str`
/// 4. `timestamp: i64` - Unix milliseconds
pub const SQL_INSERT_MESSAGE: &str =
    "INSERT INTO messages (sender, receiver, body, timestamp) VALUES (?, ?, ?, ?)";

/// Messages exchanged between two logins in either direction
///
/// **Parameters:**
/// 1. `a: &str`
/// 2. `b: &str`
/// 3. `b: &str`
/// 4. `a: &str`
///
/// **Returns:** `(id, sender, receiver, body, timestamp)`, ascending by
/// timestamp with insertion order breaking ties.
pub const SQL_SELECT_MESSAGES_BETWEEN: &str = "SELECT id, sender, receiver, body, timestamp FROM messages WHERE (sender = ? AND receiver = ?) OR (sender = ? AND receiver = ?) ORDER BY timestamp ASC, id ASC";

/// **Returns:** `(id, sender, receiver, body, timestamp)` of broadcasts, ascending
pub const SQL_SELECT_BROADCASTS: &str = "SELECT id, sender, receiver, body, timestamp FROM messages WHERE receiver = '' ORDER BY timestamp ASC, id ASC";
