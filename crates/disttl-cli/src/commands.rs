use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use disttl::{
    DistributedTtlLru, InvalidationTransport, TracingObserver, decode_signals, signal_topic,
};
use futures_util::StreamExt;
use tokio::sync::watch;

use crate::cli::{DemoArgs, SignalArgs, WatchArgs};
use crate::config::AppConfig;
use crate::output::{print_signal, print_success};

/// Publish one invalidation signal on the configured scope.
pub async fn signal(
    config: &AppConfig,
    transport: Arc<dyn InvalidationTransport>,
    args: &SignalArgs,
) -> Result<()> {
    let cache = DistributedTtlLru::<String>::from_config(&config.cache, transport)?;
    cache
        .update_signal(&args.tags)
        .await
        .with_context(|| format!("failed to publish signal on {}", cache.topic()))?;

    print_success(&format!(
        "Signalled {} on {}",
        args.tags.join(", "),
        cache.topic()
    ));
    Ok(())
}

/// Print decoded signals until Ctrl-C or `--count` signals were seen.
pub async fn watch(
    config: &AppConfig,
    transport: Arc<dyn InvalidationTransport>,
    args: &WatchArgs,
) -> Result<()> {
    let topic = signal_topic(&config.cache.scope);
    let mut stream = transport
        .subscribe(&topic)
        .await
        .with_context(|| format!("failed to subscribe to {topic}"))?;

    println!("{}: {}", "Watching".cyan(), topic);

    let mut seen = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => break,
            next = stream.next() => {
                let Some(payload) = next else {
                    anyhow::bail!("subscription to {topic} closed");
                };
                print_signal(&topic, &decode_signals(&payload));
                seen += 1;
                if args.count.is_some_and(|count| seen >= count) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Run a listening cache node that logs every applied signal.
pub async fn demo(
    config: &AppConfig,
    transport: Arc<dyn InvalidationTransport>,
    args: &DemoArgs,
) -> Result<()> {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    demo_until(config, transport, args, ctrl_c).await
}

/// Body of [`demo`]: reports the cache size every interval until `stop`
/// resolves, then shuts the listener down.
pub async fn demo_until(
    config: &AppConfig,
    transport: Arc<dyn InvalidationTransport>,
    args: &DemoArgs,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    let cache = DistributedTtlLru::<String>::from_config(&config.cache, transport)?
        .with_observer(TracingObserver::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = cache.start(shutdown_rx).await?;

    println!(
        "{}: {} (capacity {})",
        "Listening".cyan(),
        cache.topic(),
        config.cache.capacity
    );

    tokio::pin!(stop);

    let mut ticker = tokio::time::interval(Duration::from_secs(args.report_interval_secs.max(1)));
    loop {
        tokio::select! {
            biased;

            _ = &mut stop => break,
            _ = ticker.tick() => {
                let (current, max) = cache.size();
                tracing::info!(current, max, state = ?cache.state(), "cache size");
            }
        }
    }

    let _ = shutdown_tx.send(true);
    listener.await.context("listener task failed")?;
    print_success("Stopped");
    Ok(())
}
