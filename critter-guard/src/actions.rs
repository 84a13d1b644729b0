//! Execution of pending actions against a selected target.
//!
//! One dispatch point for every action variant. Each arm re-validates
//! against current index state at execution time; registration-time checks
//! are worthless by the time a target is finally clicked.

use tracing::{debug, info};

use critter_core::{AccessGrant, AccessTier, PrincipalId};

use crate::notify::MessageKind;
use crate::pending::PendingAction;
use crate::service::CritterGuard;
use crate::types::{CritterSighting, InfoReport};

impl CritterGuard {
    /// Execute a claimed pending action against the selected critter.
    pub(crate) async fn dispatch(
        &self,
        principal: PrincipalId,
        action: PendingAction,
        target: &CritterSighting,
    ) {
        debug!(principal = %principal, target = %target.id, kind = ?action.kind(), "Executing pending action");
        match action {
            PendingAction::Access {
                target: grantee,
                target_name,
                grant,
                tier,
            } => {
                self.apply_access_change(principal, grantee, target_name, grant, tier, target)
                    .await
            }
            PendingAction::Info => self.apply_info(principal, target).await,
            PendingAction::TameFor {
                target: new_owner,
                target_name,
            } => {
                self.apply_tame_for(principal, new_owner, target_name, target)
                    .await
            }
            PendingAction::Untame { caps } => {
                self.taming.untame(principal, &caps, target).await;
                self.world.confirm_cue(principal, target.id).await;
            }
        }
    }

    async fn apply_access_change(
        &self,
        principal: PrincipalId,
        grantee: PrincipalId,
        target_name: String,
        grant: bool,
        tier: AccessTier,
        target: &CritterSighting,
    ) {
        let Some(mount) = self.index.mount(target.id).await else {
            self.notifier.notify(principal, MessageKind::NotTamed).await;
            self.world.reject_cue(principal, target.id).await;
            return;
        };
        if !mount.is_owner(principal) {
            self.notifier
                .notify(principal, MessageKind::NotYourCritter)
                .await;
            self.world.reject_cue(principal, target.id).await;
            return;
        }

        if grant {
            // Owners and holders of the same tier have nothing to gain
            if mount.is_owner(grantee) || mount.grant_for(grantee).map(|g| g.tier) == Some(tier) {
                self.notifier
                    .notify(principal, MessageKind::AlreadyHasAccess)
                    .await;
                self.world.reject_cue(principal, target.id).await;
                return;
            }
            if tier == AccessTier::Passenger && !mount.animal.kind.supports_passengers() {
                self.notifier
                    .notify(principal, MessageKind::PassengersUnsupported)
                    .await;
                self.world.reject_cue(principal, target.id).await;
                return;
            }

            // A different existing tier is replaced, never duplicated
            let grant_record = AccessGrant::new(target.id, grantee, tier);
            if self.index.insert_grant(grant_record.clone()).await.is_none() {
                return;
            }
            self.persister.save_grant(&grant_record).await;
            if let Some(updated) = self.index.mount(target.id).await {
                self.persister.save_mount(&updated).await;
            }

            let granter_name = self.display_name(principal).await;
            self.notifier
                .notify(
                    principal,
                    MessageKind::GrantIssued {
                        target_name,
                        tier,
                    },
                )
                .await;
            self.notifier
                .notify(
                    grantee,
                    MessageKind::AccessGranted {
                        by: granter_name,
                        tier,
                    },
                )
                .await;
            self.world.confirm_cue(principal, target.id).await;
            info!(mount = %target.id, grantee = %grantee, ?tier, "Granted mount access");
        } else if self.index.remove_grant(target.id, grantee).await.is_some() {
            self.persister.delete_grant(target.id, grantee).await;
            if let Some(updated) = self.index.mount(target.id).await {
                self.persister.save_mount(&updated).await;
            }
            self.notifier
                .notify(principal, MessageKind::AccessRevokedFor { target_name })
                .await;
            self.notifier.notify(grantee, MessageKind::AccessRevoked).await;
            self.world.confirm_cue(principal, target.id).await;
            info!(mount = %target.id, grantee = %grantee, "Revoked mount access");
        } else {
            self.notifier
                .notify(principal, MessageKind::AlreadyHasNoAccess)
                .await;
            self.world.reject_cue(principal, target.id).await;
        }
    }

    async fn apply_info(&self, principal: PrincipalId, target: &CritterSighting) {
        let stats = self.world.critter_stats(target.id).await;
        let mut report = InfoReport {
            id: target.id,
            kind: target.kind,
            name: target.name.clone(),
            owner_name: None,
            stats,
            full_access: Vec::new(),
            passenger_access: Vec::new(),
        };

        if let Some(mount) = self.index.mount(target.id).await {
            report.name = mount.animal.name.clone();
            report.owner_name = Some(self.display_name(mount.animal.owner).await);
            let mut full = Vec::new();
            let mut passenger = Vec::new();
            for grant in mount.access.values() {
                let name = self.display_name(grant.principal).await;
                match grant.tier {
                    AccessTier::Full => full.push(name),
                    AccessTier::Passenger => passenger.push(name),
                }
            }
            full.sort();
            passenger.sort();
            report.full_access = full;
            report.passenger_access = passenger;
        } else if let Some(pet) = self.index.pet(target.id).await {
            report.name = pet.animal.name.clone();
            report.owner_name = Some(self.display_name(pet.animal.owner).await);
        }

        self.notifier
            .notify(principal, MessageKind::Info(Box::new(report)))
            .await;
        self.world.confirm_cue(principal, target.id).await;
    }

    async fn apply_tame_for(
        &self,
        principal: PrincipalId,
        new_owner: PrincipalId,
        target_name: String,
        target: &CritterSighting,
    ) {
        // Re-check: the target may have been tamed since registration
        let tracked = self.index.critter(target.id).await.is_some()
            || matches!(self.persister.store().find_pet(target.id).await, Ok(Some(_)));
        if tracked {
            self.notifier
                .notify(principal, MessageKind::AlreadyTamed)
                .await;
            self.world.reject_cue(principal, target.id).await;
            return;
        }
        self.taming.handle_tame(new_owner, target).await;
        self.notifier
            .notify(principal, MessageKind::TamedFor { target_name })
            .await;
        self.world.confirm_cue(principal, target.id).await;
    }
}
