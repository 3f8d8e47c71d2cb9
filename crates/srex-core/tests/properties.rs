//! Behavioural guarantees of the recovery pipeline.

use std::sync::Arc;

use serde_json::{json, Value};
use srex_core::recovery::{extract_object, Extraction};
use srex_core::{
    normalize, Alert, Contract, GenerationContext, Indicator, IndicatorKind, NormalizedDocument,
    Objective, PipelineOrchestrator, RecoveryParser, RecoveryStrategy, RecoveryTarget,
    ScriptedGenerator, Severity, SrexConfig, Stage, Suggestion, TimeWindow,
};

fn ctx() -> GenerationContext {
    GenerationContext::new("search", "Full-text search backend")
}

fn recover_and_normalize(raw: &str) -> (RecoveryStrategy, NormalizedDocument) {
    let ctx = ctx();
    let recovered = RecoveryParser::default().recover(
        raw,
        RecoveryTarget {
            contract: Contract::Integrated,
            ctx: &ctx,
            label: "validation_and_integration",
        },
    );
    (recovered.strategy, normalize(&recovered.value, &ctx))
}

#[test]
fn test_recovery_always_terminates_with_every_field() {
    let inputs = [
        "",
        "{",
        "}",
        "[[[",
        "\"unterminated",
        "{\"indicators\": {\"0\": {\"name\": \"q\"}}, \"explanation\": [\"a\", \"b\"]}",
        "{'indicators': [{'name': 'x'}]}",
        "```\nnot json\n```",
        "{\"a\": \"\\",
        "\u{feff}{\"explanation\": \"bom\"}",
        "Sure, here you go: {\"explanation\": \"ok\"}",
        "null",
        "12.5",
        "{\"alerts\": [{\"name\": \"x\", \"severity\": 3}]}",
    ];
    for raw in inputs {
        let (_, doc) = recover_and_normalize(raw);
        let value = serde_json::to_value(&doc).unwrap();
        for key in ["indicators", "objectives", "alerts", "suggestions"] {
            assert!(value[key].is_array(), "{key} for {raw:?}");
        }
        assert!(value["explanation"].is_string(), "explanation for {raw:?}");
    }
}

#[test]
fn test_normalization_is_idempotent() {
    let trees = [
        json!({"indicators": [{"name": "search_latency", "value": "120"}]}),
        json!({
            "slis": {"1": {"type": "error"}, "0": "query availability"},
            "objectives": [{"indicator": ["search_latency", "x"], "target": "97%", "window": "quarterly"}],
            "alerts": ["IndexStale"],
            "recommendations": {"latency": "Shard at 40M docs", "general": "be careful"},
            "explanation": ["  padded  ", "{{ x }}"]
        }),
        json!({"suggestions": ["no digits"], "explanation": 42}),
        json!({
            "explanation": "{{ {{x}} }}",
            "indicators": [{"name": "lat {{ {{y}} }}", "type": "latency"}]
        }),
        json!({}),
    ];
    for tree in trees {
        let once = normalize(&tree, &ctx());
        let twice = normalize(&serde_json::to_value(&once).unwrap(), &ctx());
        assert_eq!(once, twice, "tree {tree}");
    }
}

#[test]
fn test_well_formed_document_round_trips() {
    let doc = NormalizedDocument {
        indicators: vec![Indicator {
            name: "search_latency_p95".to_string(),
            description: "95th percentile query latency".to_string(),
            kind: IndicatorKind::Latency,
            unit: "ms".to_string(),
            source: "prometheus".to_string(),
            metric: "histogram_quantile(0.95, search_duration_bucket)".to_string(),
            value: Some(210.0),
        }],
        objectives: vec![Objective {
            name: "search-latency".to_string(),
            description: "Queries stay fast".to_string(),
            indicator: "search_latency_p95".to_string(),
            target: 99.5,
            window: TimeWindow::SevenDays,
        }],
        alerts: vec![Alert {
            name: "SearchSlow".to_string(),
            description: "p95 above 400ms".to_string(),
            severity: Severity::Critical,
            expression: Some("search_latency_p95 > 400".to_string()),
            for_duration: Some("10m".to_string()),
        }],
        suggestions: vec![Suggestion {
            metric: "search_latency_p95".to_string(),
            recommendation: "Add 2 replicas per shard".to_string(),
        }],
        explanation: "Latency is the binding constraint.".to_string(),
    };

    let text = serde_json::to_string_pretty(&doc).unwrap();
    let (strategy, back) = recover_and_normalize(&text);
    assert_eq!(strategy, RecoveryStrategy::Direct);
    assert_eq!(back, doc);
    assert!(Contract::Integrated.validate(&back).passed());
}

#[test]
fn test_numeric_keyed_indicators_become_an_ordered_list() {
    let doc = normalize(
        &json!({"indicators": {
            "1": {"name": "second", "type": "error"},
            "0": {"name": "first", "type": "latency"}
        }}),
        &ctx(),
    );
    let names: Vec<_> = doc.indicator_names().collect();
    assert_eq!(names, ["first", "second"]);
}

#[test]
fn test_single_indicator_gets_exactly_one_default_objective() {
    let doc = normalize(
        &json!({"indicators": [{"name": "latency_api", "type": "latency"}], "objectives": []}),
        &ctx(),
    );
    assert_eq!(doc.objectives.len(), 1);
    assert_eq!(doc.objectives[0].indicator, "latency_api");
    assert!(TimeWindow::ALL.contains(&doc.objectives[0].window));
}

#[test]
fn test_missing_closers_are_synthesized() {
    let (strategy, _) = recover_and_normalize("{\"a\": 1, \"b\": [1,2");
    assert_eq!(strategy, RecoveryStrategy::BraceBalanced);

    let ctx = ctx();
    let recovered = RecoveryParser::default().recover(
        "{\"a\": 1, \"b\": [1,2",
        RecoveryTarget {
            contract: Contract::Integrated,
            ctx: &ctx,
            label: "x",
        },
    );
    assert_eq!(recovered.value, json!({"a": 1, "b": [1, 2]}));
}

#[test]
fn test_conversational_reply_skips_brace_scanning() {
    let raw = "Hello! How can I help you today?";
    assert_eq!(extract_object(raw), Extraction::Conversational);
    let (strategy, doc) = recover_and_normalize(raw);
    assert_eq!(strategy, RecoveryStrategy::DefaultSynthesized);
    assert!(!doc.explanation.is_empty());

    // A marker inside a larger word is not a greeting.
    assert!(matches!(
        extract_object("this {\"a\": 1} thing"),
        Extraction::Found(_)
    ));
}

#[tokio::test]
async fn test_earlier_stage_alerts_survive_integration() {
    let generator = Arc::new(ScriptedGenerator::new([
        r#"{"indicators": [{"name": "search_up", "type": "availability"}]}"#,
        r#"{"objectives": [{"name": "up", "indicator": "search_up", "target": 99.9, "window": "30d"}]}"#,
        r#"{"alerts": [{"name": "SearchDown", "severity": "critical", "for": "1m"}]}"#,
        r#"{"suggestions": [{"metric": "search_up", "recommendation": "Run 3 replicas"}], "explanation": "Single replica today."}"#,
        // Omits alerts; its indicator would otherwise yield a synthesized one.
        r#"{"indicators": [{"name": "search_up", "type": "availability"}], "explanation": "Done."}"#,
    ]));
    let run = PipelineOrchestrator::new(generator, &SrexConfig::default())
        .run(ctx())
        .await
        .unwrap();

    let stage3 = &run.step(Stage::AlertGeneration).unwrap().outcome.document;
    let stage5 = &run.step(Stage::ValidationAndIntegration).unwrap().outcome.document;
    assert_eq!(stage5.alerts[0].name, "search_up_breach");
    assert_eq!(run.final_document.alerts, stage3.alerts);
    assert_eq!(run.final_document.alerts[0].name, "SearchDown");
}

#[test]
fn test_validation_never_mutates_the_document() {
    let (_, doc) = recover_and_normalize("{\"objectives\": [{\"indicator\": \"ghost\"}]}");
    let before = doc.clone();
    let result = Contract::Integrated.validate(&doc);
    assert!(!result.passed());
    assert_eq!(doc, before);
    let value: Value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["valid"], false);
    assert!(value["errors"].as_object().map_or(false, |e| !e.is_empty()));
}
