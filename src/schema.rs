//! Diesel schema for the three persistent tables of §3. Columns match one-to-one;
//! `id`/`name_id`/`object_id`/`user_id`/`role_id` are stored as `Int8` (Postgres has no
//! native unsigned type) and converted to `u64` at the `DieselStore` boundary.

table! {
    role_names (id) {
        id -> Int8,
        name -> Varchar,
    }
}

table! {
    roles (id) {
        id -> Int8,
        name_id -> Int8,
        object_id -> Int8,
        action_flags -> Int2,
    }
}

table! {
    user_roles (id) {
        id -> Int8,
        user_id -> Int8,
        role_id -> Int8,
    }
}

joinable!(roles -> role_names (name_id));
joinable!(user_roles -> roles (role_id));

allow_tables_to_appear_in_same_query!(role_names, roles, user_roles,);
