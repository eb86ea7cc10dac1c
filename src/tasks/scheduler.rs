use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::tasks::grading;

const STALE_RECOVERY_INTERVAL: Duration = Duration::from_secs(60);

pub(crate) async fn run(state: AppState) -> Result<()> {
    let concurrency = state.settings().grading().worker_concurrency;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(concurrency + 1);
    for worker_id in 0..concurrency {
        handles.push(tokio::spawn(grading_worker(state.clone(), worker_id, shutdown_rx.clone())));
    }
    handles.push(tokio::spawn(recover_stale_loop(state.clone(), shutdown_rx.clone())));

    tracing::info!(
        concurrency,
        poll_interval_seconds = state.settings().grading().poll_interval_seconds,
        "Grading worker started"
    );

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    tracing::info!("Grading worker stopped");
    Ok(())
}

async fn grading_worker(state: AppState, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
    let poll_interval = Duration::from_secs(state.settings().grading().poll_interval_seconds);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match grading::claim_next_submission(&state).await {
            Ok(Some(submission_id)) => {
                match grading::grade_claimed_submission(&state, &submission_id).await {
                    Ok(outcome) => {
                        tracing::debug!(worker_id, submission_id, outcome = outcome.as_str(), "Job done");
                    }
                    Err(err) => {
                        if let Err(recovery_err) = grading::recover_submission_on_unexpected_error(
                            &state,
                            &submission_id,
                            &err.to_string(),
                        )
                        .await
                        {
                            tracing::error!(
                                worker_id,
                                submission_id,
                                error = %recovery_err,
                                "Failed to release submission after worker error"
                            );
                        }
                        tracing::error!(
                            worker_id,
                            submission_id,
                            error = %err,
                            "Failed to grade submission"
                        );
                    }
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(worker_id, error = %err, "Failed to claim submission"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(poll_interval) => {}
        }
    }
}

async fn recover_stale_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(STALE_RECOVERY_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = grading::recover_stale_submissions(&state).await {
                    tracing::error!(error = %err, "recover_stale_submissions failed");
                }
            }
        }
    }
}
