//! The Vaultwarden (bitwarden_rs) database catalog.
//!
//! Tables: users, ciphers, folders, folders_ciphers, attachments, devices,
//! invitations, organizations, users_organizations.

use vaultmetrics_core::{AggregateQuery as Q, MetricDefinition as M};

const USER_LABELS: &[&str] = &["user_uuid", "username", "email"];
const USER_COLUMNS: &[&str] = &["users.uuid", "users.name", "users.email"];

const ORG_LABELS: &[&str] = &["org_uuid", "name", "billing_email"];
const ORG_COLUMNS: &[&str] = &["organizations.uuid", "organizations.name", "organizations.billing_email"];

pub fn vault() -> Vec<M> {
    vec![
        M::scalar("users", "Number of users", Q::count("users")),
        M::scalar("passwords", "Number of passwords", Q::count("ciphers")),
        M::labeled(
            "passwords_by_user",
            "Number of passwords by user",
            USER_LABELS,
            Q::grouped(USER_COLUMNS, "ciphers JOIN users ON users.uuid = ciphers.user_uuid"),
        ),
        M::scalar("folders", "Number of folders", Q::count("folders")),
        M::labeled(
            "passwords_by_folder",
            "Number of passwords by folder",
            &["folder_uuid"],
            Q::grouped(
                &["folders.uuid"],
                "folders JOIN folders_ciphers ON folders.uuid = folders_ciphers.folder_uuid",
            ),
        ),
        M::scalar("attachments", "Number of attachments", Q::count("attachments")),
        M::scalar("devices", "Number of devices", Q::count("devices")),
        M::labeled(
            "devices_by_user",
            "Number of devices by user",
            USER_LABELS,
            Q::grouped(USER_COLUMNS, "devices JOIN users ON users.uuid = devices.user_uuid"),
        ),
        M::labeled(
            "devices_by_devicename",
            "Number of devices by devicename",
            &["devicename"],
            Q::grouped(&["devices.name"], "devices"),
        ),
        M::scalar("invitations", "Number of invitations", Q::count("invitations")),
        M::scalar("organizations", "Number of organizations", Q::count("organizations")),
        M::labeled(
            "users_by_organization",
            "Number of users by organization",
            ORG_LABELS,
            Q::grouped(
                ORG_COLUMNS,
                "organizations JOIN users_organizations ON organizations.uuid = users_organizations.org_uuid",
            ),
        ),
        M::labeled(
            "attachments_by_organization",
            "Number of attachments by organization",
            ORG_LABELS,
            Q::grouped(
                ORG_COLUMNS,
                "attachments JOIN ciphers ON attachments.cipher_uuid = ciphers.uuid \
                 JOIN organizations ON ciphers.organization_uuid = organizations.uuid",
            ),
        ),
        M::labeled(
            "attachments_by_user",
            "Number of attachments by user",
            USER_LABELS,
            Q::grouped(
                USER_COLUMNS,
                "attachments JOIN ciphers ON attachments.cipher_uuid = ciphers.uuid \
                 JOIN users ON ciphers.user_uuid = users.uuid",
            ),
        ),
        M::labeled(
            "duplicate_organizations_by_name",
            "Number of duplicate organizations by name",
            &["name"],
            Q::grouped(&["organizations.name"], "organizations").having_duplicates(),
        ),
        M::labeled(
            "duplicate_organizations_by_email",
            "Number of duplicate organizations by email",
            &["email"],
            Q::grouped(&["organizations.billing_email"], "organizations").having_duplicates(),
        ),
    ]
}
