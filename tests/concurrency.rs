mod common;

use common::logging;
use futures::future::join_all;
use walletforge::api::export::GenerateRequest;
use walletforge::api::export::ListPolicy;
use walletforge::api::export::WalletForge;

/// test: interleaved saves and deletes keep the counter equal to the
/// number of stored wallets.
///
/// scenario:
/// 1. store 10 wallets.
/// 2. concurrently generate 8 batches of 5 and delete the 10 originals,
///    each original twice.
/// 3. the total counter, the index and the listing all agree on 40.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
pub async fn counters_agree_under_concurrent_writes() -> anyhow::Result<()> {
    logging::tracing_logger();

    let forge = WalletForge::in_memory();
    let seed = forge.generate_batch(&GenerateRequest::new(10, None)).await?;
    let seed_ids: Vec<String> = seed.records().iter().map(|r| r.id.clone()).collect();

    let generators = (0..8).map(|i| {
        let forge = forge.clone();
        tokio::spawn(async move {
            forge
                .generate_batch(&GenerateRequest::new(5, Some(format!("g{i}"))))
                .await
                .map(|_| ())
        })
    });

    let deleters = seed_ids
        .iter()
        .chain(seed_ids.iter())
        .cloned()
        .map(|id| {
            let forge = forge.clone();
            tokio::spawn(async move { forge.delete(&id).await.is_ok() })
        });

    for result in join_all(generators).await {
        result??;
    }
    let deleted = join_all(deleters)
        .await
        .into_iter()
        .map(|r| r.map(usize::from))
        .sum::<Result<usize, _>>()?;

    // each original is deleted exactly once.
    assert_eq!(10, deleted);

    let stats = forge.stats().await?;
    let listed = forge.list(ListPolicy::Redacted).await?;
    assert_eq!(40, stats.total_wallets);
    assert_eq!(40, stats.indexed_wallets);
    assert_eq!(40, listed.len());
    assert!(forge.audit().await?.is_consistent());

    Ok(())
}
