use tankstats_scout::cascade::Cascade;
use tankstats_scout::testing::{ivan_profile, labeled_profile, target, text_profile, MockReply, MockSource};
use tankstats_scout::traits::{ProfileSource, Tier};
use tankstats_scout::validity::is_invalid;

fn boxed(sources: Vec<MockSource>) -> Vec<Box<dyn ProfileSource>> {
    sources
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn ProfileSource>)
        .collect()
}

#[tokio::test]
async fn valid_static_result_never_escalates() {
    let static_tier = MockSource::new(Tier::Static).on(12345, MockReply::Profile(ivan_profile()));
    let rendered = MockSource::new(Tier::Rendered);
    let proxy = MockSource::new(Tier::TextProxy);
    let (rendered_calls, proxy_calls) = (rendered.call_counter(), proxy.call_counter());

    let cascade = Cascade::new(boxed(vec![static_tier, rendered, proxy]));
    let outcome = cascade.run(&target(12345, Some("Ivan"))).await.unwrap();

    assert_eq!(outcome.tier, Some(Tier::Static));
    assert_eq!(outcome.attempted, vec![Tier::Static]);
    assert_eq!(rendered_calls.get(), 0);
    assert_eq!(proxy_calls.get(), 0);

    let stats = outcome.stats;
    assert_eq!(stats.nickname.as_deref(), Some("Ivan"));
    assert_eq!(stats.battles, 1234);
    assert_eq!(stats.win_rate, Some(55.5));
    assert_eq!(stats.avg_dmg, 987);
    assert_eq!(stats.global_rating, 5000);
    assert_eq!(stats.wins, Some(685));
}

#[tokio::test]
async fn escalates_to_rendered_when_static_is_empty() {
    let static_tier = MockSource::new(Tier::Static).otherwise(MockReply::Profile(labeled_profile(&[], Some("Ivan"))));
    let rendered = MockSource::new(Tier::Rendered).otherwise(MockReply::Profile(ivan_profile()));
    let proxy = MockSource::new(Tier::TextProxy);
    let proxy_calls = proxy.call_counter();

    let cascade = Cascade::new(boxed(vec![static_tier, rendered, proxy]));
    let outcome = cascade.run(&target(12345, Some("Ivan"))).await.unwrap();

    assert_eq!(outcome.tier, Some(Tier::Rendered));
    assert_eq!(outcome.attempted, vec![Tier::Static, Tier::Rendered]);
    assert_eq!(proxy_calls.get(), 0);
    assert!(!is_invalid(&outcome.stats));
}

#[tokio::test]
async fn text_proxy_recovers_battles_but_stays_invalid() {
    let static_tier = MockSource::new(Tier::Static).otherwise(MockReply::Profile(labeled_profile(&[], Some("Petr"))));
    let rendered = MockSource::new(Tier::Rendered).otherwise(MockReply::Nothing);
    let proxy = MockSource::new(Tier::TextProxy).otherwise(MockReply::Profile(text_profile("Профиль игрока\nБои: 500\n")));

    let cascade = Cascade::new(boxed(vec![static_tier, rendered, proxy]));
    let outcome = cascade.run(&target(777, Some("Petr"))).await.unwrap();

    assert_eq!(outcome.attempted, vec![Tier::Static, Tier::Rendered, Tier::TextProxy]);
    // The invalid proxy result does not replace the first candidate.
    assert_eq!(outcome.tier, Some(Tier::Static));
    assert!(is_invalid(&outcome.stats));
}

#[tokio::test]
async fn text_proxy_alone_reads_battles_from_text() {
    let proxy = MockSource::new(Tier::TextProxy).otherwise(MockReply::Profile(text_profile("Профиль игрока\nБои: 500\n")));

    let cascade = Cascade::new(boxed(vec![proxy]));
    let outcome = cascade.run(&target(777, Some("Petr"))).await.unwrap();

    assert_eq!(outcome.tier, Some(Tier::TextProxy));
    assert_eq!(outcome.stats.battles, 500);
    assert_eq!(outcome.stats.global_rating, 0);
    assert_eq!(outcome.stats.avg_dmg, 0);
    assert!(is_invalid(&outcome.stats));
}

#[tokio::test]
async fn rendered_failure_escalates_to_proxy() {
    let static_tier = MockSource::new(Tier::Static).otherwise(MockReply::Profile(labeled_profile(&[], None)));
    let rendered = MockSource::new(Tier::Rendered).otherwise(MockReply::Fail("chrome crashed".into()));
    let proxy = MockSource::new(Tier::TextProxy).otherwise(MockReply::Profile(text_profile(
        "Личный рейтинг 4 321\nБои 2 000\nПроцент побед 50 %\nСредний урон 1 500\n",
    )));

    let cascade = Cascade::new(boxed(vec![static_tier, rendered, proxy]));
    let outcome = cascade.run(&target(5, Some("Olga"))).await.unwrap();

    assert_eq!(outcome.tier, Some(Tier::TextProxy));
    assert_eq!(outcome.stats.battles, 2000);
    assert_eq!(outcome.stats.avg_dmg, 1500);
    assert_eq!(outcome.stats.wins, Some(1000));
    assert_eq!(outcome.stats.nickname.as_deref(), Some("Olga"));
}

#[tokio::test]
async fn static_failure_aborts_the_account() {
    let static_tier = MockSource::new(Tier::Static).otherwise(MockReply::Fail("connection refused".into()));
    let rendered = MockSource::new(Tier::Rendered).otherwise(MockReply::Profile(ivan_profile()));
    let rendered_calls = rendered.call_counter();

    let cascade = Cascade::new(boxed(vec![static_tier, rendered]));
    let err = cascade.run(&target(1, None)).await.unwrap_err();

    assert!(format!("{err:#}").contains("connection refused"));
    assert_eq!(rendered_calls.get(), 0);
}

#[tokio::test]
async fn nothing_anywhere_yields_default_stats_with_job_nickname() {
    let cascade = Cascade::new(boxed(vec![
        MockSource::new(Tier::Static),
        MockSource::new(Tier::TextProxy),
    ]));
    let outcome = cascade.run(&target(9, Some("Anna"))).await.unwrap();

    assert_eq!(outcome.tier, None);
    assert_eq!(outcome.stats.nickname.as_deref(), Some("Anna"));
    assert!(is_invalid(&outcome.stats));
}
