//! Folding one account into another.
//!
//! The whole merge runs in one transaction, and every step checks current
//! state first, so repeating a merge that already happened changes nothing.

use crate::db::merge::{delete_account, demote_account, move_bookmarks, set_credentials};
use crate::db::sqlite::fetch_account;
use crate::db::{BookmarkMoves, ChowStorage};
use crate::error::ChowError;
use crate::types::Account;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePlan {
    /// Nothing to do: same identity, or the source is already gone.
    Noop,
    /// A local account folds into an external one and is deleted.
    AbsorbLocal,
    /// One external account folds into another and is reduced to a stub.
    AbsorbExternal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub plan: MergePlan,
    pub moves: BookmarkMoves,
}

impl MergeOutcome {
    fn noop() -> Self {
        Self {
            plan: MergePlan::Noop,
            moves: BookmarkMoves::default(),
        }
    }
}

pub fn plan(source: &Account, destination: &Account) -> Result<MergePlan, ChowError> {
    if source.identity() == destination.identity() {
        return Ok(MergePlan::Noop);
    }
    match (source, destination) {
        (Account::Local(_), Account::External(_)) => Ok(MergePlan::AbsorbLocal),
        (Account::External(_), Account::External(_)) => Ok(MergePlan::AbsorbExternal),
        (_, Account::Local(dest)) => Err(ChowError::InvalidMerge(format!(
            "cannot merge {} into local account {}",
            source.identity(),
            dest.identity
        ))),
    }
}

/// Move everything `source` owns onto `destination`.
pub async fn merge_accounts(
    storage: &ChowStorage,
    source: &str,
    destination: &str,
) -> Result<MergeOutcome, ChowError> {
    if source == destination {
        return Ok(MergeOutcome::noop());
    }
    let mut tx = storage.pool().begin().await?;

    let Some(src) = fetch_account(&mut *tx, source).await? else {
        return Ok(MergeOutcome::noop());
    };
    let Some(dest) = fetch_account(&mut *tx, destination).await? else {
        return Err(ChowError::InvalidMerge(format!(
            "destination account {destination} does not exist"
        )));
    };
    let plan = plan(&src, &dest)?;
    if plan == MergePlan::Noop {
        return Ok(MergeOutcome::noop());
    }

    // Credentials move only while the source still carries them.
    let credentials = src.user_name().map(|user_name| {
        (
            user_name.to_string(),
            src.password_digest().map(str::to_string),
            src.thumbnail_image().map(str::to_string),
        )
    });

    let moves = move_bookmarks(&mut tx, source, destination).await?;

    // The source gives up its login name before the destination takes it.
    match plan {
        MergePlan::AbsorbLocal => delete_account(&mut tx, source).await?,
        MergePlan::AbsorbExternal => demote_account(&mut tx, source).await?,
        MergePlan::Noop => {}
    }
    if let Some((user_name, digest, thumbnail)) = &credentials {
        set_credentials(
            &mut tx,
            destination,
            user_name,
            digest.as_deref(),
            thumbnail.as_deref(),
        )
        .await?;
    }

    tx.commit().await?;
    info!(
        source = %source,
        destination = %destination,
        plan = ?plan,
        reassigned = moves.reassigned,
        collapsed = moves.collapsed,
        invitations = moves.invitations,
        "accounts merged"
    );
    Ok(MergeOutcome { plan, moves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::bookmarks::BookmarkLedger;
    use crate::service::bookmarks::tests::restaurant;
    use crate::types::{DEFAULT_NOTE, ExternalAccount, LocalAccount};

    fn local(id: &str) -> Account {
        Account::Local(LocalAccount {
            identity: id.to_string(),
            user_name: id.to_string(),
            password_digest: "d".to_string(),
            thumbnail_image: "anon01.gif".to_string(),
        })
    }

    fn external(id: &str) -> Account {
        Account::External(ExternalAccount::stub(id))
    }

    #[test]
    fn plans_follow_the_variant_pair() {
        assert_eq!(plan(&local("a"), &external("b")).unwrap(), MergePlan::AbsorbLocal);
        assert_eq!(
            plan(&external("a"), &external("b")).unwrap(),
            MergePlan::AbsorbExternal
        );
        assert_eq!(plan(&external("b"), &external("b")).unwrap(), MergePlan::Noop);
        assert!(matches!(
            plan(&external("a"), &local("b")),
            Err(ChowError::InvalidMerge(_))
        ));
        assert!(plan(&local("a"), &local("b")).is_err());
    }

    async fn setup() -> (ChowStorage, BookmarkLedger, Account, Account) {
        let storage = ChowStorage::in_memory().await.unwrap();
        let alice = storage
            .insert_local("alice", "digest", "cat.gif")
            .await
            .unwrap();
        let bee = storage.ensure_external("B").await.unwrap();
        (storage.clone(), BookmarkLedger::new(storage), alice, bee)
    }

    #[tokio::test]
    async fn local_bookmarks_follow_the_person() {
        let (storage, ledger, alice, bee) = setup().await;
        let r1 = restaurant("R1", "Slice");
        ledger.add(&alice, &r1, DEFAULT_NOTE).await.unwrap();

        let outcome = merge_accounts(&storage, "local:alice", "B").await.unwrap();
        assert_eq!(outcome.plan, MergePlan::AbsorbLocal);
        assert_eq!(outcome.moves.reassigned, 1);

        let mine = ledger.list_by_owner(&bee).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].restaurant_id, "R1");
        assert!(ledger.list_by_owner(&alice).await.unwrap().is_empty());
        assert!(storage.account("local:alice").await.unwrap().is_none());

        let merged = storage.account("B").await.unwrap().unwrap();
        assert_eq!(merged.user_name(), Some("alice"));
        assert_eq!(merged.password_digest(), Some("digest"));
        assert_eq!(merged.thumbnail_image(), Some("cat.gif"));
    }

    #[tokio::test]
    async fn destination_never_ends_up_invited_to_its_own_bookmark() {
        let (storage, ledger, alice, bee) = setup().await;
        storage.ensure_external("C").await.unwrap();
        let b = ledger
            .add(&alice, &restaurant("R1", "Slice"), DEFAULT_NOTE)
            .await
            .unwrap();
        ledger
            .set_invitees(&alice, b.key, &["B".into(), "C".into()])
            .await
            .unwrap();

        merge_accounts(&storage, "local:alice", "B").await.unwrap();
        let moved = ledger.get(b.key).await.unwrap().unwrap();
        assert_eq!(moved.owner, "B");
        assert_eq!(moved.invitees, ["C"]);
        assert!(ledger.list_by_invitee(&bee).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invitations_are_rewritten_without_duplicates() {
        let (storage, ledger, _alice, bee) = setup().await;
        let carl = storage.ensure_external("C").await.unwrap();
        let b = ledger
            .add(&carl, &restaurant("R1", "Slice"), DEFAULT_NOTE)
            .await
            .unwrap();
        ledger
            .set_invitees(&carl, b.key, &["local:alice".into(), "B".into()])
            .await
            .unwrap();

        let outcome = merge_accounts(&storage, "local:alice", "B").await.unwrap();
        assert_eq!(outcome.moves.invitations, 1);
        let updated = ledger.get(b.key).await.unwrap().unwrap();
        assert_eq!(updated.invitees, ["B"]);
        assert_eq!(ledger.list_by_invitee(&bee).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn colliding_bookmarks_collapse_into_the_destination() {
        let (storage, ledger, alice, bee) = setup().await;
        storage.ensure_external("C").await.unwrap();
        storage.ensure_external("D").await.unwrap();
        let r1 = restaurant("R1", "Slice");
        let theirs = ledger.add(&alice, &r1, DEFAULT_NOTE).await.unwrap();
        let ours = ledger.add(&bee, &r1, DEFAULT_NOTE).await.unwrap();
        ledger
            .set_invitees(&alice, theirs.key, &["C".into()])
            .await
            .unwrap();
        ledger
            .set_invitees(&bee, ours.key, &["D".into()])
            .await
            .unwrap();

        let outcome = merge_accounts(&storage, "local:alice", "B").await.unwrap();
        assert_eq!(outcome.moves.collapsed, 1);
        assert!(ledger.get(theirs.key).await.unwrap().is_none());
        let mut invitees = ledger.get(ours.key).await.unwrap().unwrap().invitees;
        invitees.sort();
        assert_eq!(invitees, ["C", "D"]);
        assert_eq!(ledger.list_by_owner(&bee).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn external_sources_are_demoted_not_deleted() {
        let (storage, ledger, _alice, _bee) = setup().await;
        merge_accounts(&storage, "local:alice", "B").await.unwrap();
        let other = storage.ensure_external("X").await.unwrap();
        ledger
            .add(&other, &restaurant("R2", "Noodle Bar"), DEFAULT_NOTE)
            .await
            .unwrap();

        // B now carries alice's credentials and folds into X.
        let outcome = merge_accounts(&storage, "B", "X").await.unwrap();
        assert_eq!(outcome.plan, MergePlan::AbsorbExternal);
        let stub = storage.account("B").await.unwrap().unwrap();
        assert_eq!(stub.user_name(), None);
        assert_eq!(stub.password_digest(), None);
        let x = storage.account("X").await.unwrap().unwrap();
        assert_eq!(x.user_name(), Some("alice"));
    }

    #[tokio::test]
    async fn repeating_a_merge_changes_nothing() {
        let (storage, ledger, alice, bee) = setup().await;
        ledger
            .add(&alice, &restaurant("R1", "Slice"), DEFAULT_NOTE)
            .await
            .unwrap();
        merge_accounts(&storage, "local:alice", "B").await.unwrap();
        let again = merge_accounts(&storage, "local:alice", "B").await.unwrap();
        assert_eq!(again.plan, MergePlan::Noop);
        assert_eq!(ledger.list_by_owner(&bee).await.unwrap().len(), 1);
        assert_eq!(
            storage.account("B").await.unwrap().unwrap().user_name(),
            Some("alice")
        );

        // A demoted stub has no credentials left to copy over.
        let x = storage.ensure_external("X").await.unwrap();
        merge_accounts(&storage, "B", "X").await.unwrap();
        merge_accounts(&storage, "B", "X").await.unwrap();
        let x_after = storage.account(x.identity()).await.unwrap().unwrap();
        assert_eq!(x_after.user_name(), Some("alice"));
    }

    #[tokio::test]
    async fn merging_into_a_local_account_is_rejected() {
        let (storage, _, _, _) = setup().await;
        let err = merge_accounts(&storage, "B", "local:alice").await.unwrap_err();
        assert!(matches!(err, ChowError::InvalidMerge(_)));
        assert!(storage.account("B").await.unwrap().is_some());
    }
}
