//! End-to-end properties of the transformation/URL compilation pipeline

use mediaflow::prelude::*;

#[test]
fn compilation_is_idempotent_and_nondestructive() {
    let t = Transformation::new()
        .width(300)
        .height(200)
        .crop("fill")
        .chain()
        .effect("sepia");
    let first = t.generate().unwrap();
    let second = t.generate().unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "c_fill,h_200,w_300/e_sepia");

    // The builder stays usable after generation.
    let extended = t.chain().angle(45);
    assert_eq!(extended.generate().unwrap(), "c_fill,h_200,w_300/e_sepia/a_45");
}

#[test]
fn clone_isolation_across_segments_and_layers() {
    let t = Transformation::new()
        .overlay(TextLayer::new("Hi").font_family("Arial").font_size(12))
        .chain()
        .width(100);
    let before = t.generate().unwrap();
    let clone = t.clone();

    let mutated = t.effect("grayscale").chain().height(50);
    assert_eq!(clone.generate().unwrap(), before);
    assert_ne!(clone.generate().unwrap(), mutated.generate().unwrap());
}

#[test]
fn variable_ordering_matches_the_wire_contract() {
    let t = Transformation::new()
        .variable("$second", 1)
        .variable("$first", 2);
    assert_eq!(t.generate().unwrap(), "$first_2,$second_1");

    let t = Transformation::new()
        .variables([Var::new("z", 5), Var::new("foo", "$z*2")])
        .variable("$second", 1)
        .variable("$first", 2);
    assert_eq!(t.generate().unwrap(), "$first_2,$second_1,$z_5,$foo_$z_mul_2");
}

#[test]
fn layer_round_trip_with_text_encoding() {
    let t = Transformation::new()
        .overlay(TextLayer::new("Hello").font_size(18).font_family("Arial"));
    assert_eq!(t.generate().unwrap(), "l_text:Arial_18:Hello");
}

#[test]
fn delimiter_injection_is_impossible_via_literal_text() {
    // Text containing the reserved `,` and `/` delimiters must not change
    // the top-level segment/parameter/component structure.
    let tricky = "a,b/c";
    let t = Transformation::new()
        .width(100)
        .overlay(TextLayer::new(tricky).font_family("Arial").font_size(12))
        .chain()
        .height(50);
    let generated = t.generate().unwrap();

    let segments: Vec<&str> = generated.split('/').collect();
    assert_eq!(segments.len(), 2, "slash in text must not add segments: {generated}");
    let params: Vec<&str> = segments[0].split(',').collect();
    assert_eq!(params.len(), 2, "comma in text must not add params: {generated}");
    let layer = params.iter().find(|p| p.starts_with("l_")).unwrap();
    assert_eq!(layer.split(':').count(), 3, "colon structure changed: {generated}");
}

#[test]
fn conditions_compose_with_expressions() {
    let condition = Expression::attribute(Predefined::Width)
        .gt(Expression::value(1000))
        .compile();
    let t = Transformation::new()
        .if_condition(condition)
        .unwrap()
        .width(500)
        .end_if()
        .unwrap();
    assert_eq!(t.generate().unwrap(), "if_w_gt_1000/w_500/if_end");
}

#[test]
fn full_delivery_url_composition() {
    let config = CloudConfig::new("demo", "key", "abcd").unwrap();
    let url = DeliveryUrl::new(config)
        .resource_type("video")
        .transformation(
            Transformation::new()
                .width(640)
                .fps(Some(24.0), Some(29.97))
                .keyframe_interval(2.0)
                .unwrap()
                .chain()
                .overlay(SubtitlesLayer::new("subs/en.srt").font_family("Arial").font_size(40)),
        )
        .format("mp4")
        .build("dogs/run")
        .unwrap();
    assert_eq!(
        url,
        "https://res.mediaflow.io/demo/video/upload/fps_24-29.97,ki_2.0,w_640/l_subtitles:Arial_40:subs:en.srt/dogs/run.mp4"
    );
}
