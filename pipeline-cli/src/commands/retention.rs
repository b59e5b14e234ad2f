use crate::context::AppContext;
use anyhow::Result;
use core_library::ShardRegistry;
use core_sync::{DeletionOptions, DeletionOutcome, Retention};
use tracing::info;

async fn retention(ctx: &AppContext) -> Retention {
    Retention::new(
        ctx.gateway().await,
        ShardRegistry::new(ctx.config.layout.clone()),
        ctx.config.buckets.snapshots.clone(),
        ctx.prompt(),
    )
}

pub async fn run_delete_local(ctx: &AppContext, options: DeletionOptions) -> Result<()> {
    let outcome = retention(ctx).await.delete_local(options).await?;
    report(&outcome);
    Ok(())
}

pub async fn run_delete_remote(ctx: &AppContext, options: DeletionOptions) -> Result<()> {
    let outcome = retention(ctx).await.delete_remote(options).await?;
    report(&outcome);
    Ok(())
}

fn report(outcome: &DeletionOutcome) {
    match outcome {
        DeletionOutcome::NothingToDelete => info!("Nothing to delete"),
        DeletionOutcome::DryRun { candidates } => {
            for name in candidates {
                println!("{}", name);
            }
        }
        DeletionOutcome::Declined { .. } => info!("Aborted, nothing deleted"),
        DeletionOutcome::Deleted { requested, deleted } => {
            info!(requested, deleted = deleted.len(), "Deletion finished")
        }
    }
}
