//! UUIDv7 helper.
//!
//! Task and refresh token ids are generated app-side as UUIDv7 so they sort
//! by creation time. Users, roles and permissions keep PG's gen_random_uuid().

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
