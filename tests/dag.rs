//! Unordered group semantics: permutation, overlap, and NOT barriers.

use linecheck::{CheckerBuilder, Config, ErrorKind, Report};

fn run(check: &str, input: &str) -> Report {
    let mut builder = CheckerBuilder::new(Config::default());
    builder.text(check);
    builder.finish().check(input)
}

const DAG_CHECK: &str = "\
CHECK-DAG: test [[V1:\\w+]] = 1
CHECK-DAG: test [[V2:\\w+]] = 2
CHECK-DAG: test [[V3:\\w+]] = 3
CHECK-DAG: add [[V1]] + [[V2]] = [[V3]]
CHECK: test final
";

#[test]
fn group_admits_permutations() {
    // Source order 1, 2, 3 against input order 2, 1, 3.
    let input = "test b = 2\ntest a = 1\ntest c = 3\nadd a + b = c\ntest final\n";
    let report = run(DAG_CHECK, input);
    assert!(report.success(), "{report}");

    // And against the source order itself.
    let input = "test a = 1\ntest b = 2\ntest c = 3\nadd a + b = c\ntest final\n";
    assert!(run(DAG_CHECK, input).success());

    // Captures from the permuted matches still resolve: a swap in the add
    // line fails.
    let input = "test b = 2\ntest a = 1\ntest c = 3\nadd b + a = c\ntest final\n";
    assert!(!run(DAG_CHECK, input).success());
}

#[test]
fn group_member_failure_names_the_directive() {
    let input = "test b = 2\ntest a = 1\nadd a + b = c\ntest final\n";
    let report = run(DAG_CHECK, input);
    assert!(!report.success());
    let error = report.errors().next().unwrap();
    assert_eq!(error.kind, ErrorKind::NoMatch);
    assert!(error.message.contains("CHECK-DAG"));
    assert!(error.message.contains("= 3"));
}

#[test]
fn matches_may_not_overlap() {
    let check = "CHECK-DAG: mov\nCHECK-DAG: mov\n";
    assert!(!run(check, "mov\n").success());
    assert!(run(check, "mov\nmov\n").success());
    // Two matches on one line at distinct positions are fine.
    assert!(run(check, "mov mov\n").success());
}

#[test]
fn group_starts_at_the_cursor() {
    let check = "CHECK: begin\nCHECK-DAG: a\nCHECK-DAG: b\n";
    assert!(run(check, "begin\nb\na\n").success());
    // Group members before the cursor do not count.
    assert!(!run(check, "a\nbegin\nb\n").success());
}

#[test]
fn group_resolves_preceding_not() {
    let check = "CHECK: begin\nCHECK-NOT: bad\nCHECK-DAG: alpha\nCHECK-DAG: beta\n";
    assert!(run(check, "begin\nbeta\nalpha\n").success());

    // 'bad' between the resolving match and the group's first line.
    let report = run(check, "begin\nbad\nbeta\nalpha\n");
    assert!(!report.success());
    assert_eq!(
        report.errors().next().map(|d| d.kind),
        Some(ErrorKind::UnexpectedMatch)
    );
}

#[test]
fn interleaved_not_orders_the_blocks() {
    let check = "\
CHECK-DAG: test [[V1:\\w+]] = 1
CHECK-DAG: test [[V2:\\w+]] = 2
CHECK-NOT: test final
CHECK-DAG: add [[V1]] + [[V2]]
";
    // Both blocks in order, nothing excluded in between.
    let input = "test b = 2\ntest a = 1\nadd a + b\ntest final\n";
    let report = run(check, input);
    assert!(report.success(), "{report}");

    // The excluded line sits between the two blocks.
    let input = "test b = 2\ntest a = 1\ntest final\nadd a + b\n";
    let report = run(check, input);
    assert!(!report.success());
    assert_eq!(
        report.errors().next().map(|d| d.kind),
        Some(ErrorKind::UnexpectedMatch)
    );

    // The block after the barrier may not reach back before the barrier:
    // the add line precedes the test lines, so the second block has no
    // match and the failure names it.
    let input = "add a + b\ntest b = 2\ntest a = 1\ntest final\n";
    let report = run(check, input);
    assert!(!report.success());
    let error = report.errors().next().unwrap();
    assert!(error.message.contains("CHECK-DAG: add"));
}

#[test]
fn trailing_not_rejoins_the_pending_buffer() {
    let check = "CHECK-DAG: a\nCHECK-DAG: b\nCHECK-NOT: bad\nCHECK: end\n";
    assert!(run(check, "b\na\nok\nend\n").success());

    // Excluded between the group's last match and the resolving CHECK.
    assert!(!run(check, "b\na\nbad\nend\n").success());

    // But not before the group.
    assert!(run(check, "bad\nb\na\nend\n").success());
}

#[test]
fn dag_permutation_is_order_insensitive_in_source() {
    // If a run succeeds, permuting the group members in the check file
    // succeeds too.
    let inputs = ["x\ny\nz\n", "z\nx\ny\n", "y\nz\nx\n"];
    let checks = [
        "CHECK-DAG: x\nCHECK-DAG: y\nCHECK-DAG: z\n",
        "CHECK-DAG: z\nCHECK-DAG: y\nCHECK-DAG: x\n",
        "CHECK-DAG: y\nCHECK-DAG: x\nCHECK-DAG: z\n",
    ];
    for input in &inputs {
        for check in &checks {
            assert!(run(check, input).success(), "{check} vs {input}");
        }
    }
}
