use metrics::{IntCounter, Result, try_create_int_counter};
use once_cell::sync::Lazy;

pub static ATTESTATION_DATA_CACHE_HITS: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_attestation_data_cache_hits_total",
        "Attestation data requests answered from the cache",
    )
});

pub static ATTESTATION_DATA_CACHE_MISSES: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_attestation_data_cache_misses_total",
        "Attestation data requests that computed a fresh value",
    )
});

pub static ATTESTATION_DATA_CACHE_WAITS: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_attestation_data_cache_waits_total",
        "Attestation data requests that waited on another in-flight request",
    )
});

pub static POOL_SAVE_QUEUE_DROPS: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_pool_save_queue_drops_total",
        "Detached pool saves dropped because the queue was full",
    )
});

pub static BUILDER_FALLBACKS: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_builder_fallbacks_total",
        "Block productions that fell back from the builder to a local payload",
    )
});

pub static CIRCUIT_BREAKER_TRIPS: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_builder_circuit_breaker_trips_total",
        "Block productions where the circuit breaker refused the builder",
    )
});

pub static BLOCKS_PRODUCED: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_blocks_produced_total",
        "Blocks assembled for proposing validators",
    )
});

pub static ATTESTATIONS_PUBLISHED: Lazy<Result<IntCounter>> = Lazy::new(|| {
    try_create_int_counter(
        "validator_rpc_attestations_published_total",
        "Signed attestations accepted and broadcast",
    )
});
