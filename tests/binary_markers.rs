mod common;

use spvexec::{Harness, StringsInOrder, TestSpec, TypedBuffer, Verdict};

const MARKER_STRINGS: &str = r#"
     %mbegin = OpString "spvexec.marker.begin"
       %mmid = OpString "spvexec.marker.mid"
       %mend = OpString "spvexec.marker.end"
"#;

fn marked_source() -> String {
    // OpString leads the debug section, ahead of OpSource.
    let (head, tail) = common::NEGATE_F32
        .split_once("               OpSource GLSL 430\n")
        .unwrap();
    format!("{head}{MARKER_STRINGS}               OpSource GLSL 430\n{tail}")
}

#[test]
fn markers_survive_assembly_and_the_case_still_runs() {
    const TEST_NAME: &str = "markers_survive_assembly_and_the_case_still_runs";
    let Some(context) = common::shared_context(TEST_NAME) else {
        return;
    };
    let harness = Harness::with_context(context);

    let input = common::sample_floats(16);
    let expected: Vec<f32> = input.iter().map(|v| -v).collect();
    let build = |markers: [&str; 3]| {
        TestSpec::builder("markers", marked_source())
            .compute([16, 1, 1])
            .input(TypedBuffer::from_slice(&input))
            .output(TypedBuffer::from_slice(&expected))
            .binary_verifier(StringsInOrder::new(markers))
            .build()
            .unwrap()
    };

    match harness.run(&build([
        "spvexec.marker.begin",
        "spvexec.marker.mid",
        "spvexec.marker.end",
    ])) {
        Verdict::Pass => {}
        Verdict::Skipped(reason) => return common::skip_or_panic(TEST_NAME, &reason),
        other => panic!("{other}"),
    }

    let rejected = Verdict::Fail("binary verifier rejected the assembled module".into());
    let reordered = harness.run(&build([
        "spvexec.marker.begin",
        "spvexec.marker.end",
        "spvexec.marker.mid",
    ]));
    assert_eq!(reordered, rejected);

    let missing = harness.run(&build([
        "spvexec.marker.begin",
        "spvexec.marker.absent",
        "spvexec.marker.end",
    ]));
    assert_eq!(missing, rejected);
}
