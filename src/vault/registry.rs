//! Instance registry shared by every factory kind
//!
//! Holds the factory administrator, the active template id and the
//! content-addressed registry of created instances.
use odra::prelude::*;
use odra::casper_types::bytesrepr::{Bytes, ToBytes};

use super::VaultId;
use crate::errors::VaultError;
use crate::events::{AdminChanged, TemplateChanged, VaultCreated};

/// Domain separator mixed into every instance id
const VAULT_ID_DOMAIN: &[u8] = b"yield-vaults/instance/v1";

/// Registry entry of a created instance
#[odra::odra_type]
pub struct VaultRecord {
    pub asset: Address,
    /// Raw configuration payload the instance was created with
    pub config: Bytes,
    pub template: u32,
    pub owner: Address,
    /// Position in the creation order
    pub index: u32,
    pub created_at: u64,
}

#[odra::module]
pub struct VaultRegistry {
    admin: Var<Address>,
    template: Var<u32>,
    records: Mapping<VaultId, VaultRecord>,
    ids: Mapping<u32, VaultId>,
    count: Var<u32>,
}

#[odra::module]
impl VaultRegistry {
    pub fn init(&mut self, admin: Address, template: u32) {
        self.admin.set(admin);
        self.template.set(template);
        self.count.set(0);
    }

    pub fn admin(&self) -> Address {
        self.admin.get_or_revert_with(VaultError::Unauthorized)
    }

    pub fn template(&self) -> u32 {
        self.template.get_or_default()
    }

    pub fn vault_count(&self) -> u32 {
        self.count.get_or_default()
    }

    pub fn vault_at(&self, index: u32) -> Option<VaultId> {
        self.ids.get(&index)
    }

    pub fn vault_exists(&self, vault: VaultId) -> bool {
        self.records.get(&vault).is_some()
    }

    pub fn get_vault(&self, vault: VaultId) -> Option<VaultRecord> {
        self.records.get(&vault)
    }

    /// Predicts the id `create_vault` assigns to `(asset, config)`.
    /// Pure function of the factory address, the active template, the asset
    /// and the payload bytes.
    pub fn compute_vault_id(&self, asset: Address, config: Bytes) -> VaultId {
        self.derive_id(&asset, &config)
    }

    /// Switches the template used for instances created from now on
    pub fn set_template(&mut self, template: u32) {
        self.only_admin();
        let old_template = self.template();
        self.template.set(template);

        self.env().emit_event(TemplateChanged {
            old_template,
            new_template: template,
            changed_by: self.env().caller(),
        });
    }

    pub fn transfer_admin(&mut self, new_admin: Address) {
        self.only_admin();
        let old_admin = self.admin();
        self.admin.set(new_admin);

        self.env().emit_event(AdminChanged {
            old_admin,
            new_admin,
        });
    }
}

impl VaultRegistry {
    /// Stores a new instance and emits `VaultCreated`.
    /// Callers check `vault_exists` first; registering twice is a no-op.
    pub fn register(&mut self, vault: VaultId, asset: Address, config: Bytes, owner: Address) {
        if self.vault_exists(vault) {
            return;
        }
        let index = self.vault_count();
        let template = self.template();
        self.records.set(
            &vault,
            VaultRecord {
                asset,
                config,
                template,
                owner,
                index,
                created_at: self.env().get_block_time(),
            },
        );
        self.ids.set(&index, vault);
        self.count.set(index + 1);

        self.env().emit_event(VaultCreated {
            asset,
            vault,
            template,
            index,
        });
    }

    /// Record of an existing instance, reverting with `VaultNotFound`
    pub fn record(&self, vault: &VaultId) -> VaultRecord {
        self.records
            .get(vault)
            .unwrap_or_revert_with(&self.env(), VaultError::VaultNotFound)
    }

    pub fn only_admin(&self) {
        if self.env().caller() != self.admin() {
            self.env().revert(VaultError::Unauthorized);
        }
    }

    fn derive_id(&self, asset: &Address, config: &Bytes) -> VaultId {
        let mut preimage = Vec::from(VAULT_ID_DOMAIN);
        let parts = [
            self.env().self_address().to_bytes(),
            self.template().to_bytes(),
            asset.to_bytes(),
            config.to_bytes(),
        ];
        for part in parts {
            match part {
                Ok(bytes) => preimage.extend_from_slice(&bytes),
                Err(_) => self.env().revert(VaultError::InvalidConfig),
            }
        }
        self.env().hash(preimage)
    }
}
