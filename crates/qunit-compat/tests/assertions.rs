//! Assertion behavior observed through full runs: failures settle the test,
//! expected-assertion counting verifies at completion, and config toggles
//! change what counts as a failure.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{run_engine, Clock};
use qunit_compat::assert::{AssertionResult, ThrowsExpectation};
use qunit_compat::host::Engine;
use qunit_compat::interface::{QUnit, TestOutcome};
use qunit_compat::registrar::ModuleDecl;

#[test]
fn a_failing_assertion_settles_the_test_failed() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());

    qunit.module("qunit suite 1", ModuleDecl::Plain);
    qunit.test("qunit test 1", |assert| {
        assert.equal(2, 1, Some("actual should be equal to expected"))?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());

    let test = &engine.root().suites()[0].tests()[0];
    let failure = test.failure().expect("mismatch must settle failed");
    assert_eq!(
        failure.message,
        "actual should be equal to expected: expected 2 to equal 1"
    );
    assert_eq!(failure.actual, Some(json!(2)));
    assert_eq!(failure.expected, Some(json!(1)));
}

#[test]
fn passing_assertions_settle_the_test_passed() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());

    qunit.test("loose and strict", |assert| {
        assert.ok(1, Some("one is truthy"))?;
        assert.equal("2", 2, Some("loose equality coerces"))?;
        assert.not_strict_equal(json!("2"), json!(2), Some("strict does not"))?;
        assert.deep_equal(json!({"a": [1, 2]}), json!({"a": [1, 2]}), None)?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());
    assert!(engine.root().tests()[0].has_passed());
}

#[test]
fn expect_mismatch_fails_at_completion() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());

    qunit.test("short on assertions", |assert| {
        assert.expect(2);
        assert.ok(true, None)?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());

    let failure = engine.root().tests()[0]
        .failure()
        .expect("count mismatch must settle failed");
    assert_eq!(failure.message, "Expected 2 assertions, but 1 were run");
}

#[test]
fn expect_match_passes() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());

    qunit.test("exactly two", |assert| {
        assert.expect(2);
        assert.ok(true, None)?;
        assert.strict_equal(1, 1, None)?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());
    assert!(engine.root().tests()[0].has_passed());
}

#[test]
fn require_expects_fails_tests_that_never_declared_a_count() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());
    qunit.config().set_require_expects(true);

    qunit.test("undeclared", |assert| {
        assert.ok(true, None)?;
        Ok(TestOutcome::Done)
    });
    qunit.test("declared", |assert| {
        assert.expect(1);
        assert.ok(true, None)?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());

    let tests = engine.root().tests();
    let failure = tests[0].failure().expect("missing expect() must fail");
    assert_eq!(
        failure.message,
        "Expected number of assertions to be defined, but expect() was not called."
    );
    assert!(tests[1].has_passed());
}

#[test]
fn throws_and_steps_work_inside_a_running_test() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());

    qunit.test("throws and verifies checkpoints", |assert| {
        assert.throws(
            || Err("Oops".into()),
            ThrowsExpectation::MessageContains("Oops".into()),
            Some("raises"),
        )?;
        assert.step("one");
        assert.step("two");
        assert.verify_steps(&["one", "two"], Some("checkpoints recorded"))?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());
    assert!(engine.root().tests()[0].has_passed());
}

#[test]
fn push_result_failure_carries_the_values_through() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());

    qunit.test("custom assertion", |assert| {
        assert.push_result(AssertionResult {
            result: false,
            actual: json!("down"),
            expected: json!("up"),
            message: "direction should match".into(),
        })?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());

    let failure = engine.root().tests()[0]
        .failure()
        .expect("false result must settle failed");
    assert_eq!(failure.message, "direction should match");
    assert_eq!(failure.actual, Some(json!("down")));
    assert_eq!(failure.expected, Some(json!("up")));
}

#[test]
fn a_failure_does_not_leak_into_later_tests() {
    let engine = Engine::new();
    let qunit = QUnit::new(engine.clone());

    qunit.test("fails", |assert| {
        assert.ok(false, None)?;
        Ok(TestOutcome::Done)
    });
    qunit.test("still runs and passes", |assert| {
        assert.ok(true, None)?;
        Ok(TestOutcome::Done)
    });

    run_engine(&engine, &Clock::new());

    let tests = engine.root().tests();
    assert!(tests[0].failure().is_some());
    assert!(tests[1].has_passed());
    assert_eq!(engine.root().num_failed_tests(), 1);
}
