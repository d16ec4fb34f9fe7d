//! Wires every component onto the in-process broker and spawns the long-running tasks that
//! make up the worker, mirroring the set of `@app.agent`/`@app.timer`/`@app.crontab`
//! registrations `doscrawler/app.py`'s Faust app collects at import time.

use std::sync::Arc;

use doscrawler_broker::{BrokerError, MemoryChangelogSink, PartitionedTopic, Table};
use doscrawler_dumpwriter::{DumpWriter, LoggingNotifier};
use doscrawler_merger::{attack_key, AttackMerger, ChangeAttack};
use doscrawler_model::{Attack, AttackCandidate, Crawl, Dump, HostGroup, Settings, WaitEntry, WireAttackVector};
use doscrawler_resolver::{HostResolver, PgCommonCrawlLookup, SystemReverseDnsLookup};
use doscrawler_scheduler::{CrawlCache, Scheduler, WaitQueue};
use tokio::time::{interval, Duration};

/// A fresh table backed by its own in-memory changelog, the only store this build ships
/// (the development default `STORE=memory://`; see `doscrawler_broker::InProcessBroker`).
async fn table<V>() -> Result<Arc<Table<V>>, BrokerError>
where
    V: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
{
    let sink = Arc::new(MemoryChangelogSink::default());
    Ok(Arc::new(Table::recover(sink).await?))
}

/// Brings up every table/topic and spawns the pipeline's tasks. Returns the `vector_topic`
/// handle so the caller can feed `WireAttackVector`s into the pipeline, the seam a real Avro
/// consumer would plug into; this build's `main.rs` feeds it from stdin.
pub async fn spawn_pipeline(settings: Settings) -> color_eyre::eyre::Result<PartitionedTopic<WireAttackVector>> {
    let partitions = settings.topic_partitions;
    let buffer = 1024;

    let attack_table: Arc<Table<Attack>> = table().await?;
    let candidate_table: Arc<Table<AttackCandidate>> = table().await?;
    let host_table: Arc<Table<HostGroup>> = table().await?;
    let crawl_table: Arc<Table<Crawl>> = table().await?;
    let wait_table: Arc<Table<WaitEntry>> = table().await?;
    let dump_table: Arc<Table<Dump>> = table().await?;

    let (vector_topic, vector_rx) = PartitionedTopic::<WireAttackVector>::new(partitions, buffer);
    let (change_attack_topic, change_attack_rx) = PartitionedTopic::<ChangeAttack>::new(partitions, buffer);
    let (host_topic, host_rx) = PartitionedTopic::<Attack>::new(partitions, buffer);
    let (scheduler_input, scheduler_rx) = PartitionedTopic::<Attack>::new(partitions, buffer);

    // §4.2: Attack Merger.
    let merger = Arc::new(AttackMerger::new(
        settings.clone(),
        Arc::clone(&attack_table),
        Arc::clone(&candidate_table),
        host_topic.clone(),
    ));
    for mut rx in change_attack_rx {
        let merger = Arc::clone(&merger);
        tokio::spawn(async move {
            while let Some((_key, message)) = rx.recv().await {
                if let Err(err) = merger.handle(message).await {
                    log::error!("attack merger failed to handle a change-attack message: {err}");
                }
            }
        });
    }

    // Vector ingestion: decode + forward into the change-attack topic.
    for mut rx in vector_rx {
        let change_attack_topic = change_attack_topic.clone();
        tokio::spawn(async move {
            while let Some((_key, wire)) = rx.recv().await {
                if let Err(err) = doscrawler_merger::ingest_vector(wire, &change_attack_topic).await {
                    log::error!("failed to ingest an attack vector: {err}");
                }
            }
        });
    }

    // §4.3: Host Resolver.
    let common_crawl = PgCommonCrawlLookup::connect(&settings.dns_db_url).await?;
    let resolver = Arc::new(HostResolver::new(
        settings.clone(),
        Arc::clone(&host_table),
        common_crawl,
        SystemReverseDnsLookup::new(),
    ));
    for mut rx in host_rx {
        let resolver = Arc::clone(&resolver);
        let scheduler_input = scheduler_input.clone();
        tokio::spawn(async move {
            while let Some((_key, candidate)) = rx.recv().await {
                let group = match resolver.resolve(candidate.ip).await {
                    Ok(group) => group,
                    Err(err) => {
                        log::error!("host resolution failed for {}: {err}", candidate.ip);
                        continue;
                    }
                };
                for host in group.names {
                    let mut single_host = Attack::new(candidate.ip, candidate.start_time, candidate.latest_time);
                    single_host.hosts = vec![host];
                    let key = attack_key(single_host.ip, single_host.start_time);
                    if let Err(err) = scheduler_input.send(key, single_host).await {
                        log::error!("failed to forward a resolved host to the crawl scheduler: {err}");
                    }
                }
            }
        });
    }

    // §4.4/§4.5: Crawl Scheduler + Crawl Cache + wait queue.
    let scheduler = Arc::new(Scheduler::new(
        settings.clone(),
        CrawlCache::new(Arc::clone(&crawl_table)),
        WaitQueue::new(Arc::clone(&wait_table)),
    )?);
    for mut rx in scheduler_rx {
        let scheduler = Arc::clone(&scheduler);
        let change_attack_topic = change_attack_topic.clone();
        tokio::spawn(async move {
            while let Some((_key, attack)) = rx.recv().await {
                match scheduler.enqueue(attack).await {
                    Ok(Some(updated)) => {
                        let key = attack_key(updated.ip, updated.start_time);
                        if let Err(err) = change_attack_topic.send(key, ChangeAttack::Add(updated)).await {
                            log::error!("failed to publish a crawled attack back to the merger: {err}");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => log::error!("crawl scheduler failed to enqueue an attack: {err}"),
                }
            }
        });
    }

    // §4.4.2 wait sweeper.
    {
        let scheduler = Arc::clone(&scheduler);
        let scheduler_input = scheduler_input.clone();
        let period = Duration::from_secs(settings.crawl_get_wait_timer);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                match scheduler.wait_sweep(&scheduler_input).await {
                    Ok(released) if released > 0 => log::info!("wait sweep released {released} attacks"),
                    Ok(_) => {}
                    Err(err) => log::error!("wait sweep failed: {err}"),
                }
            }
        });
    }

    // §4 janitors: crawl cache, host cache, dump retention.
    {
        let scheduler = Arc::clone(&scheduler);
        let period = Duration::from_secs(settings.crawl_clean_timer);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(err) = scheduler.clean_cache().await {
                    log::error!("crawl cache cleanup failed: {err}");
                }
            }
        });
    }
    {
        let host_table = Arc::clone(&host_table);
        let settings = settings.clone();
        let period = Duration::from_secs(settings.host_clean_timer);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(err) = doscrawler_resolver::clean_expired(&host_table, &settings).await {
                    log::error!("host cache cleanup failed: {err}");
                }
            }
        });
    }

    // §4.6: Dump Writer, cron-driven.
    {
        let dump_writer = Arc::new(DumpWriter::new(
            settings.clone(),
            Arc::clone(&attack_table),
            Arc::clone(&dump_table),
            change_attack_topic.clone(),
            Arc::new(LoggingNotifier),
        ));
        let dump_cron = settings.dump_cron.clone();
        tokio::spawn(async move {
            loop {
                let now = doscrawler_model::time::now();
                let next = match doscrawler_dumpwriter::next_fire_after(&dump_cron, now) {
                    Ok(Some(next)) => next,
                    Ok(None) => {
                        log::error!("DUMP_CRON {dump_cron:?} never fires again, stopping the dump writer");
                        return;
                    }
                    Err(err) => {
                        log::error!("DUMP_CRON {dump_cron:?} is invalid: {err}");
                        return;
                    }
                };
                let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(delay).await;
                if let Err(err) = dump_writer.run().await {
                    log::error!("dump sweep failed: {err}");
                }
            }
        });

        let dump_writer = Arc::new(DumpWriter::new(
            settings.clone(),
            Arc::clone(&attack_table),
            Arc::clone(&dump_table),
            change_attack_topic,
            Arc::new(LoggingNotifier),
        ));
        let period = Duration::from_secs(settings.dump_clean_timer);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(err) = dump_writer.clean_expired().await {
                    log::error!("dump retention cleanup failed: {err}");
                }
            }
        });
    }

    log::info!("doscrawler worker is up: every component is wired to the broker.");
    Ok(vector_topic)
}
