// tests/relevance_handpicked.rs
// Hand-picked headlines and market questions against the built-in classifier.
// Each case names the tables it is meant to exercise.

use hotspot_monitor::relevance::RegionClassifier;
use hotspot_monitor::Region;

fn clf() -> RegionClassifier {
    RegionClassifier::builtin()
}

#[test]
fn headlines_land_in_the_expected_region() {
    let c = clf();
    let cases = [
        ("Russian drone strike hits Kharkiv power grid", Some(Region::RussiaUkraine)),
        ("Kim Jong Un oversees Hwasong ICBM launch", Some(Region::Korea)),
        ("PLA Navy drills near Taiwan Strait median line", Some(Region::TaiwanStrait)),
        ("IRGC seizes tanker in Strait of Hormuz", Some(Region::Iran)),
        ("Netanyahu meets hostage families in Tel Aviv", Some(Region::IsraelPalestine)),
        // blocked despite a region keyword
        ("Lakers beat Celtics in Israel exhibition game", None),
        // nothing geopolitical
        ("Markets rally as Fed holds rates", None),
    ];
    for (text, want) in cases {
        assert_eq!(c.classify(text), want, "{text}");
    }
}

#[test]
fn broad_feed_gate() {
    let c = clf();
    assert!(c.is_relevant("Explosion at army base"));
    assert_eq!(c.classify("Explosion at army base"), None);
    assert!(c.is_relevant("Taipei reports Chinese aircraft in ADIZ"));
    assert!(!c.is_relevant("Markets rally as Fed holds rates"));
    // trigger without military context
    assert!(!c.is_relevant("Breaking: celebrity wedding photos leak"));
}

#[test]
fn market_question_gate() {
    let c = clf();
    assert!(c.is_geopolitical("Will the U.S. strike Venezuela by June?"));
    assert!(c.is_geopolitical("Will Israel and Hamas agree to a ceasefire?"));
    assert!(!c.is_geopolitical("Will Bitcoin hit 100k in 2025?"));
    assert!(!c.is_geopolitical("Will the Lakers win the NBA finals?"));
    assert!(!c.is_geopolitical("Will it rain in London tomorrow?"));
    assert!(!c.is_geopolitical("Will they strike us first?"));
}

#[test]
fn relevance_rewards_matches_and_triggers() {
    let c = clf();
    let text = "Russian drone strike hits Kharkiv power grid";
    let r = c.relevance_score(text, c.classify(text));
    // three region matches cap the base at 0.6, one trigger adds 0.1
    assert!((r - 0.8).abs() < 1e-9, "got {r}");

    assert!((c.relevance_score("anything at all", None) - 0.05).abs() < 1e-9);
}
