//! Address Generator: a lazy stream of candidate addresses derived from the
//! user and co-signer HD roots across the wallet's fixed branches and all
//! four script versions.
//!
//! Generation never materializes the whole address space up front (it can
//! run into the tens of thousands of addresses once contacts are enabled),
//! so the generator is driven through an iterator that derives one address
//! at a time and only as the caller asks for it.

use recovery_common::{Error, HdPrivateKey, MuunAddress, ScriptFactory, ScriptVersion};
use tracing::warn;

const CHANGE_PATH: &str = "m/1'/1'/0";
const EXTERNAL_PATH: &str = "m/1'/1'/1";
const CONTACTS_PATH: &str = "m/1'/1'/2";

const CHANGE_MAX_INDEX: u32 = 2500;
const EXTERNAL_MAX_INDEX: u32 = 2500;
const CONTACT_COUNT: u32 = 100;
const CONTACT_ADDR_MAX_INDEX: u32 = 200;

/// One (branch, index) pair worth of derivation work, before script
/// versions are expanded.
struct Branch {
    name: &'static str,
    /// The BIP32 path from the wallet root down to this branch, e.g.
    /// `"m/1'/1'/0"` for change or `"m/1'/1'/2/7"` for contact 7 — the
    /// prefix a signer needs in order to re-derive the exact child key for
    /// an address this branch produced, given only its index.
    path_prefix: String,
    user_root: Box<dyn HdPrivateKey>,
    cosigner_root: Box<dyn HdPrivateKey>,
    max_index: u32,
}

/// Produces every candidate address in the wallet's fixed address space,
/// change branch first, then external, then (if enabled) contacts — within
/// a branch, ascending index; within an index, V2 then V3 then V4 then V5.
/// This ordering is relied on by the Scanner's progress reporting.
pub struct AddressGenerator<'a> {
    script_factory: &'a dyn ScriptFactory,
    branches: std::vec::IntoIter<Branch>,
    current_branch: Option<Branch>,
    index: u32,
    versions: std::slice::Iter<'static, ScriptVersion>,
    pending_user: Option<Box<dyn HdPrivateKey>>,
    pending_cosigner: Option<Box<dyn HdPrivateKey>>,
    pending_path: String,
}

impl<'a> AddressGenerator<'a> {
    pub fn new(
        user_root: &dyn HdPrivateKey,
        cosigner_root: &dyn HdPrivateKey,
        script_factory: &'a dyn ScriptFactory,
        generate_contacts: bool,
    ) -> Result<Self, Error> {
        let mut branches = vec![
            Branch {
                name: "change",
                path_prefix: CHANGE_PATH.to_string(),
                user_root: user_root.derive_to(CHANGE_PATH)?,
                cosigner_root: cosigner_root.derive_to(CHANGE_PATH)?,
                max_index: CHANGE_MAX_INDEX,
            },
            Branch {
                name: "external",
                path_prefix: EXTERNAL_PATH.to_string(),
                user_root: user_root.derive_to(EXTERNAL_PATH)?,
                cosigner_root: cosigner_root.derive_to(EXTERNAL_PATH)?,
                max_index: EXTERNAL_MAX_INDEX,
            },
        ];

        if generate_contacts {
            let contacts_user = user_root.derive_to(CONTACTS_PATH)?;
            let contacts_cosigner = cosigner_root.derive_to(CONTACTS_PATH)?;
            for k in 0..=CONTACT_COUNT {
                branches.push(Branch {
                    name: "contacts",
                    path_prefix: format!("{CONTACTS_PATH}/{k}"),
                    user_root: contacts_user.derived_at(k, false)?,
                    cosigner_root: contacts_cosigner.derived_at(k, false)?,
                    max_index: CONTACT_ADDR_MAX_INDEX,
                });
            }
        }

        let mut branches = branches.into_iter();
        let current_branch = branches.next();

        Ok(Self {
            script_factory,
            branches,
            current_branch,
            index: 0,
            versions: ScriptVersion::ALL.iter(),
            pending_user: None,
            pending_cosigner: None,
            pending_path: String::new(),
        })
    }

    fn advance_to_next_index(&mut self) -> bool {
        loop {
            let Some(branch) = self.current_branch.as_ref() else {
                return false;
            };
            if self.index > branch.max_index {
                self.current_branch = self.branches.next();
                self.index = 0;
                continue;
            }
            return true;
        }
    }
}

impl<'a> Iterator for AddressGenerator<'a> {
    type Item = MuunAddress;

    fn next(&mut self) -> Option<MuunAddress> {
        loop {
            if self.pending_user.is_none() {
                if !self.advance_to_next_index() {
                    return None;
                }
                let branch = self.current_branch.as_ref()?;
                let path = format!("{}/{}", branch.path_prefix, self.index);

                match (
                    branch.user_root.derived_at(self.index, false),
                    branch.cosigner_root.derived_at(self.index, false),
                ) {
                    (Ok(u), Ok(c)) => {
                        self.pending_user = Some(u);
                        self.pending_cosigner = Some(c);
                        self.pending_path = path;
                        self.versions = ScriptVersion::ALL.iter();
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(branch = branch.name, index = self.index, error = %e, "skipping address: derivation failed");
                        self.index += 1;
                        continue;
                    }
                }
            }

            let Some(version) = self.versions.next().copied() else {
                self.pending_user = None;
                self.pending_cosigner = None;
                self.index += 1;
                continue;
            };

            let user_key = self.pending_user.as_ref().unwrap();
            let cosigner_key = self.pending_cosigner.as_ref().unwrap();

            match self.script_factory.build(
                version,
                &self.pending_path,
                &user_key.public_key(),
                &cosigner_key.public_key(),
            ) {
                Ok(addr) => return Some(addr),
                Err(e) => {
                    warn!(path = %self.pending_path, %version, error = %e, "skipping address: script build failed");
                    continue;
                }
            }
        }
    }
}
