// Catapult - Declarative EVM Deployment Orchestrator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Integration tests for the value resolver: placeholder resolution against
//! scope, outputs, and the Network() pseudo-object, plus the built-in
//! sub-resolvers that touch the provider.

use alloy_primitives::{Bytes, U256};
use catapult_engine::{
    resolver::ResolveError,
    test_utils::{test_context, test_network},
    Resolver, Scope,
};
use serde_json::json;
use tracing::info;

fn scope_with(name: &str, value: serde_json::Value) -> Scope {
    let mut scope = Scope::root();
    scope.bind(name, value);
    scope
}

#[tokio::test]
async fn test_single_placeholder_returns_native_value() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    let resolver = Resolver::new(&ctx);

    let scope = scope_with("X", json!(42));
    let resolved = resolver.resolve(&json!("{{X}}"), &scope).await.unwrap();
    assert_eq!(resolved, json!(42));
}

#[tokio::test]
async fn test_interpolation_stringifies() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    let resolver = Resolver::new(&ctx);

    let scope = scope_with("X", json!("v"));
    let resolved = resolver.resolve(&json!("prefix-{{X}}"), &scope).await.unwrap();
    assert_eq!(resolved, json!("prefix-v"));

    let scope = scope_with("n", json!(7));
    let resolved = resolver.resolve(&json!("{{n}} wei ({{n}})"), &scope).await.unwrap();
    assert_eq!(resolved, json!("7 wei (7)"));
}

#[tokio::test]
async fn test_network_pseudo_object() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("sepolia", 11155111));
    let resolver = Resolver::new(&ctx);
    let scope = Scope::root();

    let chain_id = resolver.resolve(&json!("{{Network().chainId}}"), &scope).await.unwrap();
    assert_eq!(chain_id, json!(11155111u64));

    let name = resolver.resolve(&json!("chain-{{Network().name}}"), &scope).await.unwrap();
    assert_eq!(name, json!("chain-sepolia"));

    let err = resolver.resolve(&json!("{{Network().blockTime}}"), &scope).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResolveError>(),
        Some(ResolveError::UnresolvedReference(_))
    ));
}

#[tokio::test]
async fn test_outputs_and_nested_paths() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    ctx.set_output("config.result", json!({"fees": {"base": "100"}})).unwrap();
    let resolver = Resolver::new(&ctx);
    let scope = Scope::root();

    let whole = resolver.resolve(&json!("{{config.result}}"), &scope).await.unwrap();
    assert_eq!(whole, json!({"fees": {"base": "100"}}));

    let nested = resolver.resolve(&json!("{{config.result.fees.base}}"), &scope).await.unwrap();
    assert_eq!(nested, json!("100"));
}

#[tokio::test]
async fn test_scope_shadows_outputs() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    ctx.set_output("salt", json!("from-outputs")).unwrap();
    let resolver = Resolver::new(&ctx);

    let scope = scope_with("salt", json!("from-scope"));
    let resolved = resolver.resolve(&json!("{{salt}}"), &scope).await.unwrap();
    assert_eq!(resolved, json!("from-scope"));
}

#[tokio::test]
async fn test_unresolved_reference_is_fatal() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    let resolver = Resolver::new(&ctx);

    let err = resolver.resolve(&json!("{{ghost}}"), &Scope::root()).await.unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[tokio::test]
async fn test_nested_resolver_arguments() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    let resolver = Resolver::new(&ctx);
    let scope = scope_with("base", json!(10));

    let expression = json!({
        "type": "basic-arithmetic",
        "arguments": {
            "operation": "add",
            "values": [
                "{{base}}",
                {"type": "basic-arithmetic", "arguments": {"operation": "mul", "values": [2, 10]}},
            ],
        },
    });
    let resolved = resolver.resolve(&expression, &scope).await.unwrap();
    assert_eq!(resolved, json!("30"));
}

#[tokio::test]
async fn test_plain_objects_resolve_elementwise() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    let resolver = Resolver::new(&ctx);
    let scope = scope_with("X", json!("v"));

    // "type" is present but not a resolver tag, so this is data.
    let expression = json!({"type": "erc20", "symbol": "{{X}}", "decimals": 18});
    let resolved = resolver.resolve(&expression, &scope).await.unwrap();
    assert_eq!(resolved, json!({"type": "erc20", "symbol": "v", "decimals": 18}));
}

#[tokio::test]
async fn test_read_balance_returns_decimal_string() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, provider) = test_context(test_network("local", 31337));
    let holder = "0x00000000000000000000000000000000000000aa";
    provider.set_balance(holder.parse().unwrap(), U256::from(1_500_000_000_000_000_000u128));
    let resolver = Resolver::new(&ctx);

    let expression = json!({"type": "read-balance", "arguments": {"address": holder}});
    let resolved = resolver.resolve(&expression, &Scope::root()).await.unwrap();
    assert_eq!(resolved, json!("1500000000000000000"));
}

#[tokio::test]
async fn test_contract_exists() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, provider) = test_context(test_network("local", 31337));
    let deployed = "0x00000000000000000000000000000000000000bb";
    provider.set_code(deployed.parse().unwrap(), Bytes::from(vec![0x60, 0x01]));
    let resolver = Resolver::new(&ctx);

    let exists = resolver
        .resolve(&json!({"type": "contract-exists", "arguments": {"address": deployed}}), &Scope::root())
        .await
        .unwrap();
    assert_eq!(exists, json!(true));

    let missing = resolver
        .resolve(
            &json!({"type": "contract-exists", "arguments": {"address": "0x00000000000000000000000000000000000000cc"}}),
            &Scope::root(),
        )
        .await
        .unwrap();
    assert_eq!(missing, json!(false));
}

#[tokio::test]
async fn test_static_call_decodes_output() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, provider) = test_context(test_network("local", 31337));
    // uint256 42
    let mut word = [0u8; 32];
    word[31] = 42;
    provider.push_call_response(Bytes::from(word.to_vec()));
    let resolver = Resolver::new(&ctx);

    let expression = json!({
        "type": "call",
        "arguments": {
            "to": "0x00000000000000000000000000000000000000dd",
            "signature": "totalSupply()(uint256)",
        },
    });
    let resolved = resolver.resolve(&expression, &Scope::root()).await.unwrap();
    assert_eq!(resolved, json!("42"));
}

#[tokio::test]
async fn test_job_completed_tracks_context_state() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    let resolver = Resolver::new(&ctx);
    let expression = json!({"type": "job-completed", "arguments": {"job": "fund"}});

    assert_eq!(resolver.resolve(&expression, &Scope::root()).await.unwrap(), json!(false));
    ctx.mark_job_completed("fund");
    assert_eq!(resolver.resolve(&expression, &Scope::root()).await.unwrap(), json!(true));
}

#[tokio::test]
async fn test_read_json_with_referenced_document() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (ctx, _) = test_context(test_network("local", 31337));
    ctx.set_output("fetch.result", json!({"tiers": [{"fee": "5"}, {"fee": "9"}]})).unwrap();
    let resolver = Resolver::new(&ctx);

    let expression = json!({
        "type": "read-json",
        "arguments": {"value": "{{fetch.result}}", "path": "tiers.1.fee"},
    });
    let resolved = resolver.resolve(&expression, &Scope::root()).await.unwrap();
    assert_eq!(resolved, json!("9"));
}
