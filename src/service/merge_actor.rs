use crate::db::ChowStorage;
use crate::error::ChowError;
use crate::service::merge::{MergeOutcome, merge_accounts};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{info, warn};

/// Messages handled by the merge actor.
#[derive(Debug)]
pub enum MergeMessage {
    /// Fold `source` into `destination` and reply with what was done.
    Merge(String, String, RpcReplyPort<Result<MergeOutcome, ChowError>>),
}

/// Handle for submitting merges. Merges run one at a time, in arrival order.
#[derive(Clone)]
pub struct MergeHandle {
    actor: ActorRef<MergeMessage>,
}

impl MergeHandle {
    pub async fn merge(
        &self,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Result<MergeOutcome, ChowError> {
        ractor::call!(
            self.actor,
            MergeMessage::Merge,
            source.into(),
            destination.into()
        )
        .map_err(|e| ChowError::RactorError(format!("Merge RPC failed: {e}")))?
    }
}

struct MergeActorState {
    storage: ChowStorage,
}

struct MergeActor;

#[ractor::async_trait]
impl Actor for MergeActor {
    type Msg = MergeMessage;
    type State = MergeActorState;
    type Arguments = ChowStorage;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        storage: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("MergeActor started");
        Ok(MergeActorState { storage })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            MergeMessage::Merge(source, destination, rp) => {
                let result = merge_accounts(&state.storage, &source, &destination).await;
                if let Err(e) = &result {
                    warn!(source = %source, destination = %destination, error = %e, "merge failed");
                }
                let _ = rp.send(result);
            }
        }
        Ok(())
    }
}

/// Spawn the merge actor and return a handle.
pub async fn spawn(storage: ChowStorage) -> Result<MergeHandle, ChowError> {
    let (actor, _jh) = Actor::spawn(None, MergeActor, storage)
        .await
        .map_err(|e| ChowError::RactorError(format!("failed to spawn MergeActor: {e}")))?;
    Ok(MergeHandle { actor })
}
