use chrono::Duration;
use recall_core::model::{Card, CardId, Deck, DeckId, StudyMode, UserId};
use recall_core::time::fixed_now;
use services::{Clock, SettingsUpdate, StudyEngine, StudyError};
use storage::repository::{CardRepository, DeckRepository, Storage};

async fn seed_deck(storage: &Storage, owner: UserId, cards: u64) -> DeckId {
    let now = fixed_now();
    let deck = Deck::new(DeckId::new(1), owner, "Spanish", None, now).unwrap();
    storage.decks.upsert_deck(&deck).await.unwrap();

    for id in 1..=cards {
        let card = Card::new(
            CardId::new(id),
            deck.id(),
            format!("front {id}"),
            format!("back {id}"),
            None,
            None,
            now + Duration::seconds(i64::try_from(id).unwrap_or(0)),
        )
        .unwrap();
        storage.cards.upsert_card(&card).await.unwrap();
    }

    deck.id()
}

#[tokio::test]
async fn full_study_flow_over_in_memory_storage() {
    let storage = Storage::in_memory();
    let engine = StudyEngine::new(&storage, Clock::fixed(fixed_now()));
    let user = UserId::new(1);
    let deck_id = seed_deck(&storage, user, 5).await;

    // Tighten the daily new-card limit to 3.
    engine
        .update_settings(
            user,
            SettingsUpdate {
                daily_new_limit: 3,
                daily_review_limit: 100,
                rollover_hour: 4,
                preferred_mode: StudyMode::Learn,
            },
        )
        .await
        .unwrap();

    // The learn queue honors the budget.
    let queue = engine
        .due_cards(user, deck_id, StudyMode::Learn, None)
        .await
        .unwrap();
    assert_eq!(queue.len(), 3);

    // Study every queued card.
    let session = engine.start_session(user, deck_id).await.unwrap();
    for (i, card) in queue.iter().enumerate() {
        let quality = if i == 0 { 0 } else { 5 };
        let result = engine
            .submit_review(user, session.id, card.id(), quality)
            .await
            .unwrap();
        assert_eq!(result.progress.interval_days, 1);
        assert_eq!(result.feedback.message, "Next review tomorrow.");
    }

    // Budget exhausted: the learn queue dries up even with cards left.
    let queue = engine
        .due_cards(user, deck_id, StudyMode::Learn, None)
        .await
        .unwrap();
    assert!(queue.is_empty());

    // Counters are live on the settings read.
    let settings = engine.settings(user).await.unwrap();
    assert_eq!(settings.new_completed_today(), 3);
    assert_eq!(settings.remaining_new_budget(), 0);

    // Cram still sees the whole deck.
    let cram = engine
        .due_cards(user, deck_id, StudyMode::Cram, None)
        .await
        .unwrap();
    assert_eq!(cram.len(), 5);

    // End the session and check the aggregates.
    let summary = engine.end_session(user, session.id).await.unwrap();
    assert_eq!(summary.total_cards_reviewed, 3);
    assert!((summary.average_quality - 10.0 / 3.0).abs() < 1e-9);
    assert_eq!(summary.reviewed_cards.len(), 3);
    assert_eq!(summary.reviewed_cards[0].quality, 0);

    // The ended session is terminal.
    let err = engine
        .submit_review(user, session.id, CardId::new(1), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::SessionNotActive));
    let err = engine.end_session(user, session.id).await.unwrap_err();
    assert!(matches!(err, StudyError::SessionAlreadyEnded));
}

#[tokio::test]
async fn review_queue_appears_after_rollover() {
    let storage = Storage::in_memory();
    let user = UserId::new(1);
    let deck_id = seed_deck(&storage, user, 2).await;
    let start = fixed_now();

    // Day one: learn both cards.
    let engine = StudyEngine::new(&storage, Clock::fixed(start));
    let session = engine.start_session(user, deck_id).await.unwrap();
    for id in 1..=2 {
        engine
            .submit_review(user, session.id, CardId::new(id), 4)
            .await
            .unwrap();
    }
    engine.end_session(user, session.id).await.unwrap();

    // Still day one: nothing is due yet.
    let due = engine
        .due_cards(user, deck_id, StudyMode::Review, None)
        .await
        .unwrap();
    assert!(due.is_empty());

    // Day two: both cards are due and the daily counters have reset.
    let next_day = StudyEngine::new(&storage, Clock::fixed(start + Duration::days(1)));
    let due = next_day
        .due_cards(user, deck_id, StudyMode::Review, None)
        .await
        .unwrap();
    assert_eq!(due.len(), 2);

    let settings = next_day.settings(user).await.unwrap();
    assert_eq!(settings.new_completed_today(), 0);
    assert_eq!(settings.reviews_completed_today(), 0);
}
