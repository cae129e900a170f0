/*!
 * End-to-end tests of the capture cycle: filters, glue, stabilization,
 * translation batches and overlay slots driven through the engine.
 */

use std::sync::Arc;
use std::time::Instant;

use screenlate::app_config::{DisplayMode, IgnorePhrase};
use screenlate::errors::BackendError;
use screenlate::overlay::OverlayEvent;
use screenlate::translation::{BackendStatus, MockBackend};
use screenlate::{BlockState, Rect};

use crate::common::{engine_with, fragment, frame, ms, settle, test_config};

fn neko() -> Vec<screenlate::TextFragment> {
    vec![fragment("ねこ", 100.0, 100.0, 40.0, 20.0)]
}

#[tokio::test]
async fn test_engine_unchangedText_shouldTranslateOnThirdCycleAfterDetection() {
    let backend = MockBackend::working();
    let (engine, renderer) = engine_with(test_config(), Arc::new(backend.clone()));
    let t0 = Instant::now();

    let (at, batch) = settle(&engine, &neko(), t0, 10).expect("block should settle");
    assert_eq!(at, t0 + ms(150));
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.items[0].source_text, "ねこ");

    let id = batch.items[0].block_id;
    assert_eq!(engine.block_state(id), Some(BlockState::Translating));

    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    assert_eq!(engine.block_state(id), Some(BlockState::Displayed));
    assert_eq!(renderer.shown_texts(), vec!["[en] ねこ".to_string()]);
    assert_eq!(engine.context_len(), 1);
}

#[test]
fn test_engine_adjacentWords_shouldBeSentAsOneBlock() {
    let (engine, _) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let fragments = vec![
        fragment("Hello", 0.0, 0.0, 50.0, 20.0),
        fragment("World", 55.0, 0.0, 50.0, 20.0),
    ];
    let (_, batch) = settle(&engine, &fragments, Instant::now(), 10).unwrap();
    assert_eq!(batch.items[0].source_text, "Hello World");
    assert_eq!(batch.items[0].rect, Rect::new(0.0, 0.0, 105.0, 20.0));
}

#[test]
fn test_engine_lowConfidenceFragment_shouldBeDroppedBeforeGlue() {
    let mut config = test_config();
    config.ocr.defaults.line_confidence = 0.7;
    let (engine, _) = engine_with(config, Arc::new(MockBackend::working()));

    let report = engine.process_cycle(
        frame(vec![fragment("ねこ", 0.0, 0.0, 40.0, 20.0).with_line_confidence(0.5)]),
        Instant::now(),
    );
    assert_eq!(report.dropped_low_confidence, 1);
    assert_eq!(report.blocks, 0);
    assert_eq!(engine.tracked_blocks(), 0);
}

#[test]
fn test_engine_ignorePhrase_shouldDropMatchingFragment() {
    let mut config = test_config();
    config.filters.ignore_phrases = vec![IgnorePhrase::new("press any key", false)];
    let (engine, _) = engine_with(config, Arc::new(MockBackend::working()));

    let report = engine.process_cycle(
        frame(vec![
            fragment("Please press any key now", 0.0, 400.0, 240.0, 20.0),
            fragment("ねこ", 0.0, 0.0, 40.0, 20.0),
        ]),
        Instant::now(),
    );
    assert_eq!(report.dropped_ignored, 1);
    assert_eq!(report.blocks, 1);
    assert_eq!(engine.stats().dropped_ignored, 1);
}

#[test]
fn test_engine_blockInFlight_shouldNotBeSubmittedAgain() {
    let (engine, _) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let (at, _batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();

    for i in 1..=10 {
        let report = engine.process_cycle(frame(neko()), at + ms(i * 50));
        assert!(report.batch.is_none());
    }
    assert_eq!(engine.stats().batches_sent, 1);
}

#[tokio::test]
async fn test_engine_failedTranslation_shouldRetryOnceThenGiveUp() {
    let backend = MockBackend::failing();
    let (engine, renderer) = engine_with(test_config(), Arc::new(backend.clone()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;

    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);
    assert_eq!(engine.block_state(id), Some(BlockState::Stable));

    let retry = engine.process_cycle(frame(neko()), at + ms(50)).batch.expect("one retry");
    assert_eq!(retry.block_ids(), vec![id]);
    let outcome = engine.execute(retry).await;
    engine.apply_outcome(outcome, at + ms(50));

    for i in 2..10 {
        assert!(engine.process_cycle(frame(neko()), at + ms(i * 50)).batch.is_none());
    }
    assert_eq!(backend.request_count(), 2);
    assert_eq!(engine.stats().translations_failed, 2);
    assert!(renderer.events().is_empty());
}

#[tokio::test]
async fn test_engine_forcedBlockWithoutForcedRetry_shouldNotRetry() {
    let mut config = test_config();
    config.stabilization.retry_forced_blocks = false;
    let backend = MockBackend::failing();
    let (engine, _) = engine_with(config, Arc::new(backend.clone()));
    let t0 = Instant::now();

    let mut found = None;
    for i in 0..=20u64 {
        let text = format!("scroll {i}");
        let now = t0 + ms(i * 50);
        if let Some(batch) = engine.process_cycle(frame(vec![fragment(&text, 0.0, 0.0, 80.0, 20.0)]), now).batch {
            found = Some((now, text, batch));
            break;
        }
    }
    let (at, text, batch) = found.expect("forced stabilization at max settle time");
    assert_eq!(at, t0 + ms(1000));
    assert_eq!(engine.stats().forced_stabilizations, 1);

    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);
    let report = engine.process_cycle(frame(vec![fragment(&text, 0.0, 0.0, 80.0, 20.0)]), at + ms(50));
    assert!(report.batch.is_none());
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_engine_slowBackend_shouldTimeOutAndFailBlock() {
    let mut config = test_config();
    config.translation.timeout_secs = 1;
    let (engine, _) = engine_with(config, Arc::new(MockBackend::slow(5_000)));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;

    let outcome = engine.execute(batch).await;
    assert!(matches!(outcome.results[&id], Err(BackendError::Timeout { timeout_ms: 1000 })));
    engine.apply_outcome(outcome, at);
    assert_eq!(engine.block_state(id), Some(BlockState::Stable));
}

#[tokio::test]
async fn test_engine_partialSuccess_shouldResolveBlocksIndependently() {
    let (engine, renderer) = engine_with(test_config(), Arc::new(MockBackend::partial()));
    let fragments = vec![
        fragment("ねこ", 0.0, 0.0, 40.0, 20.0),
        fragment("いぬ", 0.0, 300.0, 40.0, 20.0),
    ];
    let (at, batch) = settle(&engine, &fragments, Instant::now(), 10).unwrap();
    assert_eq!(batch.len(), 2);
    let (first, second) = (batch.items[0].block_id, batch.items[1].block_id);

    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    assert_eq!(engine.block_state(first), Some(BlockState::Displayed));
    assert_eq!(engine.block_state(second), Some(BlockState::Stable));
    assert_eq!(renderer.shown_texts(), vec!["[en] ねこ".to_string()]);

    let retry = engine.process_cycle(frame(fragments), at + ms(50)).batch.unwrap();
    assert_eq!(retry.block_ids(), vec![second]);
}

#[tokio::test]
async fn test_engine_repeatedText_shouldBeServedFromCache() {
    let backend = MockBackend::working();
    let (engine, renderer) = engine_with(test_config(), Arc::new(backend.clone()));
    let t0 = Instant::now();
    let (at, batch) = settle(&engine, &neko(), t0, 10).unwrap();
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    let both = vec![
        fragment("ねこ", 100.0, 100.0, 40.0, 20.0),
        fragment("ねこ", 100.0, 400.0, 40.0, 20.0),
    ];
    for i in 1..=4 {
        let report = engine.process_cycle(frame(both.clone()), at + ms(i * 50));
        assert!(report.batch.is_none());
    }

    assert_eq!(backend.request_count(), 1);
    assert_eq!(engine.stats().cache_hits, 1);
    assert_eq!(renderer.shown_texts(), vec!["[en] ねこ".to_string(), "[en] ねこ".to_string()]);
    assert_eq!(engine.visible_overlays(), 2);
}

#[tokio::test]
async fn test_engine_secondBatch_shouldCarryPreviousContext() {
    let backend = MockBackend::working();
    let (engine, _) = engine_with(test_config(), Arc::new(backend.clone()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    let next = vec![fragment("いぬ", 100.0, 400.0, 40.0, 20.0)];
    let (_, batch) = settle(&engine, &next, at + ms(50), 10).unwrap();
    assert_eq!(batch.context.entries.len(), 1);
    assert_eq!(batch.context.entries[0].source, "ねこ");
    assert_eq!(batch.context.entries[0].translated, "[en] ねこ");
}

#[tokio::test]
async fn test_engine_vanishedBlock_shouldClearAfterDelayThenEvict() {
    let (engine, renderer) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    engine.process_cycle(frame(Vec::new()), at + ms(50));
    engine.process_cycle(frame(Vec::new()), at + ms(200));
    assert_eq!(renderer.cleared_count(), 0);

    let report = engine.process_cycle(frame(Vec::new()), at + ms(250));
    assert_eq!(report.events, vec![OverlayEvent::Cleared { id }]);
    assert_eq!(engine.block_state(id), Some(BlockState::Cleared));

    engine.process_cycle(frame(Vec::new()), at + ms(450));
    assert_eq!(engine.tracked_blocks(), 0);
}

#[tokio::test]
async fn test_engine_reappearingBlock_shouldCancelPendingClear() {
    let (engine, renderer) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    engine.process_cycle(frame(Vec::new()), at + ms(50));
    engine.process_cycle(frame(neko()), at + ms(100));
    engine.process_cycle(frame(neko()), at + ms(400));
    assert_eq!(renderer.cleared_count(), 0);
    assert_eq!(engine.visible_overlays(), 1);
}

#[tokio::test]
async fn test_engine_leaveOnscreen_shouldKeepSlotUntilReplaced() {
    let mut config = test_config();
    config.overlay.leave_translation_onscreen = true;
    let (engine, renderer) = engine_with(config, Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    for i in 1..=20 {
        engine.process_cycle(frame(Vec::new()), at + ms(i * 50));
    }
    assert_eq!(renderer.cleared_count(), 0);
    assert_eq!(engine.block_state(id), Some(BlockState::Displayed));

    let inu = vec![fragment("いぬ", 100.0, 100.0, 40.0, 20.0)];
    let (at2, batch) = settle(&engine, &inu, at + ms(1100), 10).unwrap();
    assert_eq!(batch.block_ids(), vec![id]);
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at2);

    assert_eq!(renderer.shown_texts(), vec!["[en] ねこ".to_string(), "[en] いぬ".to_string()]);
    assert_eq!(renderer.cleared_count(), 0);
}

#[tokio::test]
async fn test_engine_changedTextWithoutKeepUntilReplaced_shouldClearImmediately() {
    let mut config = test_config();
    config.overlay.keep_translated_until_replaced = false;
    let (engine, renderer) = engine_with(config, Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    let report = engine.process_cycle(frame(vec![fragment("いぬ", 100.0, 100.0, 40.0, 20.0)]), at + ms(50));
    assert_eq!(report.events, vec![OverlayEvent::Cleared { id }]);
    assert_eq!(engine.block_state(id), Some(BlockState::Detected));
    assert_eq!(renderer.cleared_count(), 1);
}

#[tokio::test]
async fn test_engine_movedDisplayedBlock_shouldRefreshSlotGeometry() {
    let (engine, _) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    let moved = Rect::new(104.0, 100.0, 40.0, 20.0);
    let report = engine.process_cycle(frame(vec![fragment("ねこ", 104.0, 100.0, 40.0, 20.0)]), at + ms(50));
    assert_eq!(
        report.events,
        vec![OverlayEvent::Updated {
            id,
            rect: moved,
            text: "[en] ねこ".to_string()
        }]
    );
}

#[tokio::test]
async fn test_engine_clearAllMidFlight_shouldDiscardLateResult() {
    let (engine, renderer) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;

    engine.clear_all_overlays(at);
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at + ms(10));

    assert!(renderer.shown_texts().is_empty());
    assert_eq!(engine.stats().translations_discarded, 1);
    assert_eq!(engine.block_state(id), Some(BlockState::Cleared));
}

#[test]
fn test_engine_sourceDisplayMode_shouldShowStabilizedText() {
    let mut config = test_config();
    config.overlay.display_mode = DisplayMode::Source;
    let (engine, renderer) = engine_with(config, Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let outcome = tokio_test::block_on(engine.execute(batch));
    engine.apply_outcome(outcome, at);

    assert_eq!(renderer.shown_texts(), vec!["ねこ".to_string()]);
    assert_eq!(engine.context_len(), 1);
}

#[test]
fn test_engine_tooManyFragments_shouldSkipCycleWithoutTouchingState() {
    let mut config = test_config();
    config.capture.max_fragments_per_cycle = 2;
    let (engine, _) = engine_with(config, Arc::new(MockBackend::working()));
    let t0 = Instant::now();

    engine.process_cycle(frame(neko()), t0);
    assert_eq!(engine.tracked_blocks(), 1);

    let noisy = vec![
        fragment("a", 0.0, 500.0, 10.0, 10.0),
        fragment("b", 200.0, 500.0, 10.0, 10.0),
        fragment("c", 400.0, 500.0, 10.0, 10.0),
    ];
    let report = engine.process_cycle(frame(noisy), t0 + ms(50));
    assert!(report.skipped);
    assert_eq!(engine.tracked_blocks(), 1);
    assert_eq!(engine.stats().cycles_skipped, 1);
}

#[tokio::test]
async fn test_engine_consecutiveFailures_shouldFlipBackendStatus() {
    let mut config = test_config();
    config.translation.unavailable_after_failures = 1;
    let (engine, _) = engine_with(config, Arc::new(MockBackend::intermittent(2)));

    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);
    assert_eq!(engine.backend_status(), BackendStatus::Available);

    let both = vec![
        fragment("ねこ", 100.0, 100.0, 40.0, 20.0),
        fragment("いぬ", 100.0, 400.0, 40.0, 20.0),
    ];
    let (at, batch) = settle(&engine, &both, at + ms(50), 10).unwrap();
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);
    assert_eq!(engine.backend_status(), BackendStatus::Unavailable);

    let retry = engine.process_cycle(frame(both), at + ms(50)).batch.unwrap();
    let outcome = engine.execute(retry).await;
    engine.apply_outcome(outcome, at + ms(50));
    assert_eq!(engine.backend_status(), BackendStatus::Available);
}

#[tokio::test]
async fn test_engine_pauseWhileTranslating_shouldGateCapture() {
    let mut config = test_config();
    config.capture.pause_ocr_while_translating = true;
    let (engine, _) = engine_with(config, Arc::new(MockBackend::working()));
    assert!(engine.should_capture());

    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    assert!(!engine.should_capture());

    let waiter = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.wait_idle().await })
    };
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    waiter.await.unwrap();
    assert!(engine.should_capture());
}

#[test]
fn test_engine_reloadConfig_shouldApplyToNextCycle() {
    let (engine, _) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let mut config = test_config();
    config.capture.max_fragments_per_cycle = 1;
    engine.reload_config(config);

    let report = engine.process_cycle(
        frame(vec![
            fragment("a", 0.0, 0.0, 10.0, 10.0),
            fragment("b", 0.0, 300.0, 10.0, 10.0),
        ]),
        Instant::now(),
    );
    assert!(report.skipped);
    assert_eq!(engine.config().capture.max_fragments_per_cycle, 1);
}

#[tokio::test]
async fn test_engine_churningBlockAgainstFailingBackend_shouldStopAfterRetry() {
    let mut config = test_config();
    config.stabilization.max_settle_time_ms = 300;
    let backend = MockBackend::failing();
    let (engine, _) = engine_with(config, Arc::new(backend.clone()));
    let t0 = Instant::now();

    for i in 0..40u64 {
        let text = format!("Staff roll line {i}");
        let now = t0 + ms(i * 50);
        if let Some(batch) = engine.process_cycle(frame(vec![fragment(&text, 0.0, 0.0, 160.0, 20.0)]), now).batch {
            let outcome = engine.execute(batch).await;
            engine.apply_outcome(outcome, now);
        }
    }

    assert_eq!(backend.request_count(), 2);
    assert_eq!(engine.stats().batches_sent, 2);
}

#[tokio::test]
async fn test_engine_reloadWithZeroMatchOverlap_shouldKeepDefaultMatching() {
    let (engine, _) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);

    let mut config = test_config();
    config.stabilization.min_match_overlap = 0.0;
    engine.reload_config(config);
    assert_eq!(engine.config().stabilization.min_match_overlap, 0.5);

    engine.process_cycle(frame(vec![fragment("いぬ", 900.0, 700.0, 40.0, 20.0)]), at + ms(50));
    assert_eq!(engine.block_state(id), Some(BlockState::Displayed));
    assert_eq!(engine.tracked_blocks(), 2);
}

#[test]
fn test_engine_newWithOutOfRangeConfig_shouldSanitize() {
    let mut config = test_config();
    config.capture.max_fragments_per_cycle = 0;
    config.translation.timeout_secs = 0;
    let (engine, _) = engine_with(config, Arc::new(MockBackend::working()));

    assert_eq!(engine.config().capture.max_fragments_per_cycle, 2000);
    assert_eq!(engine.config().translation.timeout_secs, 30);
    assert!(!engine.process_cycle(frame(neko()), Instant::now()).skipped);
}

#[tokio::test]
async fn test_engine_tickWithoutCycle_shouldFireDueClears() {
    let (engine, renderer) = engine_with(test_config(), Arc::new(MockBackend::working()));
    let (at, batch) = settle(&engine, &neko(), Instant::now(), 10).unwrap();
    let id = batch.items[0].block_id;
    let outcome = engine.execute(batch).await;
    engine.apply_outcome(outcome, at);
    engine.process_cycle(frame(Vec::new()), at + ms(50));

    assert!(engine.tick(at + ms(200)).is_empty());
    assert_eq!(engine.tick(at + ms(250)), vec![OverlayEvent::Cleared { id }]);
    assert_eq!(engine.block_state(id), Some(BlockState::Cleared));
    assert_eq!(renderer.cleared_count(), 1);
}
