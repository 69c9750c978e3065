//! Background tasks of the stores.
//!
//! Each store owns one [`CancellationToken`]; every task it spawns selects on
//! that token, so `destroy()` (or dropping the store) stops them all.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs `tick` every `period` until cancelled. The immediate first tick is skipped.
pub(crate) fn spawn_ticker<F>(
    handle: &Handle,
    cancel: CancellationToken,
    period: Duration,
    task: &'static str,
    mut tick: F,
) where
    F: FnMut() + Send + 'static,
{
    handle.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => tick(),
            }
        }
        log::trace!("{task} stopped");
    });
}

/// Feeds every event of `rx` to `on_event` until cancelled or the channel closes.
///
/// A lagged receiver reports `None`: events were lost, so the handler should
/// resync from the medium instead of trusting individual events.
pub(crate) fn spawn_listener<T, F>(
    handle: &Handle,
    cancel: CancellationToken,
    mut rx: broadcast::Receiver<T>,
    task: &'static str,
    mut on_event: F,
) where
    T: Clone + Send + 'static,
    F: FnMut(Option<T>) + Send + 'static,
{
    handle.spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                res = rx.recv() => match res {
                    Ok(ev) => on_event(Some(ev)),
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("{task} lagged behind by {skipped} events, resyncing");
                        on_event(None);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        log::trace!("{task} stopped");
    });
}

/// Discards whatever is queued in `rx`; returns how many events were pending.
pub(crate) fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> usize {
    let mut pending = 0;
    loop {
        match rx.try_recv() {
            Ok(_) => pending += 1,
            Err(TryRecvError::Lagged(skipped)) => pending += skipped as usize,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticker_runs_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let seen = count.clone();
        spawn_ticker(&Handle::current(), cancel.clone(), Duration::from_millis(100), "test ticker", move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn listener_reports_lag_as_none() {
        let (tx, rx) = broadcast::channel::<u32>(2);
        for i in 0..5 {
            tx.send(i).unwrap();
        }

        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        spawn_listener(&Handle::current(), cancel.clone(), rx, "test listener", move |ev| {
            let _ = out_tx.send(ev);
        });

        assert_eq!(out_rx.recv().await, Some(None));
        assert_eq!(out_rx.recv().await, Some(Some(3)));
        assert_eq!(out_rx.recv().await, Some(Some(4)));
        cancel.cancel();
    }

    #[test]
    fn drain_counts_pending() {
        let (tx, mut rx) = broadcast::channel::<u32>(8);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(drain(&mut rx), 2);
        assert_eq!(drain(&mut rx), 0);
    }
}
