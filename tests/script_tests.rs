mod common;

use crate::common::fake_device::FakeDevice;
use crate::common::records::{app_document, home_screen, login_screen, settings_screen};
use screen_script::device::DeviceAction;
use screen_script::document::ScrollDirection;
use screen_script::resolver::Limits;
use screen_script::script::{
    CompileError, ExecutionResult, RunError, RuntimeOptions, compile, execute, sanitize,
};
use screen_script::trace::TraceComment;

fn options() -> RuntimeOptions {
    RuntimeOptions {
        limits: Limits {
            settle_ms: 0,
            ..Limits::default()
        },
        ..RuntimeOptions::default()
    }
}

fn run_with(source: &str, device: &mut FakeDevice, options: RuntimeOptions) -> ExecutionResult {
    let script = compile(source).unwrap();
    execute(&script, &app_document(), device, options)
}

fn run(source: &str, device: &mut FakeDevice) -> ExecutionResult {
    run_with(source, device, options())
}

fn comments(result: &ExecutionResult) -> Vec<TraceComment> {
    result.trace_records.iter().map(|r| r.comment).collect()
}

/// Device that moves from home to settings on any tap.
fn home_then_settings(rows: &[&str]) -> FakeDevice {
    FakeDevice::with_transitions(
        vec![home_screen(), settings_screen(rows)],
        |action, current| match action {
            DeviceAction::Tap { .. } if current == 0 => 1,
            _ => current,
        },
    )
}

// ============================================================================
// Compilation
// ============================================================================

#[test]
fn compile_emits_sorted_handle_header() {
    let compiled = compile("$settings__wifi.tap()\nhome__settings.tap()\n").unwrap();
    assert_eq!(
        compiled.elements,
        vec!["home__settings".to_string(), "settings__wifi".to_string()]
    );
    let lines: Vec<&str> = compiled.code.lines().collect();
    assert_eq!(lines[0], "home__settings = element(\"home__settings\")");
    assert_eq!(lines[1], "settings__wifi = element(\"settings__wifi\")");
    assert_eq!(lines[2], "settings__wifi.tap()", "'$' prefix is stripped");
    assert_eq!(compiled.header_len(), 2);
}

#[test]
fn compile_maps_lines_back_to_source() {
    let source = "# open settings\nhome__settings.tap()\n$settings__wifi.tap()\n";
    let compiled = compile(source).unwrap();
    assert_eq!(compiled.source_line(3), Some(1));
    assert_eq!(compiled.source_line(5), Some(3));
    assert_eq!(compiled.source_line(1), None, "Header lines have no direct source");

    let header = compiled.statement_ref(1);
    assert_eq!(header.source_line, Some(2), "Header points at the first use");
    assert_eq!(header.source_code.as_deref(), Some("home__settings.tap()"));

    let body = compiled.statement_ref(5);
    assert_eq!(body.compiled_code, "settings__wifi.tap()");
    assert_eq!(body.source_code.as_deref(), Some("$settings__wifi.tap()"));
}

#[test]
fn compile_leaves_strings_and_comments_alone() {
    let compiled = compile("print('home__settings is $here')  # settings__wifi\n").unwrap();
    assert!(compiled.elements.is_empty());
    assert_eq!(compiled.code, "print('home__settings is $here')  # settings__wifi");
}

#[test]
fn compile_sanitizes_odd_names() {
    assert_eq!(sanitize("login__e-mail"), "login__e_mail");
    assert_eq!(sanitize("9lives"), "_9lives");
    let compiled = compile("$login__pass%word.tap()").unwrap();
    assert_eq!(compiled.elements, vec!["login__pass%word".to_string()]);
    assert!(compiled.code.contains("login__pass_word = element(\"login__pass%word\")"));
}

#[test]
fn compile_rejects_error_suppression() {
    let cases = [
        ("try:\n    home__settings.tap()\nexcept:\n    pass\n", 1, "try"),
        ("home__settings.tap()\nwith x:\n    pass\n", 2, "with"),
        ("x = 1\nsuppress(Exception)\n", 2, "suppress"),
    ];
    for (source, line, construct) in cases {
        match compile(source) {
            Err(CompileError::SuppressionSyntax {
                line: got_line,
                construct: got,
            }) => {
                assert_eq!(got_line, line, "Line for {:?}", source);
                assert_eq!(got, construct);
            }
            other => panic!("Expected SuppressionSyntax for {:?}, got {:?}", source, other),
        }
    }
}

#[test]
fn compile_allows_keywords_inside_strings() {
    assert!(compile("print('try: with suppress(x)')").is_ok());
}

#[test]
fn compile_reports_syntax_errors_with_source_lines() {
    let err = compile("home__settings.tap()\nx = (1 + 2\n").unwrap_err();
    assert!(matches!(err, CompileError::Syntax { .. }), "Got {:?}", err);

    let err = compile("home__settings.tap()\nprint('open)\n").unwrap_err();
    assert_eq!(err.line(), 2, "Line counts in source, not compiled, lines");

    let err = compile("$.tap()").unwrap_err();
    assert!(matches!(err, CompileError::InvalidReference { line: 1, .. }));

    assert!(compile("def f():\n    pass\n").is_err());
    assert!(compile("x = 1 +\n").is_err());
}

#[test]
fn compile_accepts_control_flow() {
    let source = "\
count = 0
for row in settings__list:
    if row.get_text() == 'Wi-Fi':
        break
    elif count > 3:
        continue
    else:
        count += 1
while count < 2 and not False:
    count = count + 1
items = [1, 2, 3]
lookup = {'text': 'Wi-Fi'}
";
    let compiled = compile(source).unwrap();
    assert_eq!(compiled.elements, vec!["settings__list".to_string()]);
}

// ============================================================================
// Execution: primitives
// ============================================================================

#[test]
fn tap_logs_action_and_done() {
    let mut device = FakeDevice::fixed(home_screen());
    let result = run("home__settings.tap()\n", &mut device);

    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(result.action_count, 1);
    assert_eq!(comments(&result), vec![TraceComment::Action, TraceComment::Done]);

    let action = &result.trace_records[0];
    assert_eq!(action.action.as_deref(), Some("tap"));
    assert_eq!(action.node_id, Some(3));
    assert_eq!(action.element.as_deref(), Some("home__settings"));
    assert_eq!(action.source_line, Some(1));
    assert_eq!(action.compiled_line, Some(2));
    assert_eq!(action.source_code.as_deref(), Some("home__settings.tap()"));

    let done = &result.trace_records[1];
    assert!(
        done.source_line.is_none() && done.compiled_line.is_none(),
        "Done record has no statement"
    );
    assert_eq!(device.actions, vec![DeviceAction::Tap { x: 990, y: 100 }]);
}

#[test]
fn primitive_navigates_before_acting() {
    let mut device = home_then_settings(&["Wi-Fi", "Bluetooth"]);
    let result = run("settings__wifi.tap()\n", &mut device);

    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(result.action_count, 1, "Navigation taps are not counted");
    assert_eq!(
        comments(&result),
        vec![TraceComment::Navigate, TraceComment::Action, TraceComment::Done]
    );
    assert_eq!(device.action_names(), vec!["tap", "tap"]);
}

#[test]
fn get_text_feeds_control_flow() {
    let mut device = FakeDevice::fixed(home_screen());
    let source = "\
greeting = home__greeting.get_text()
if greeting.lower() == 'welcome':
    home__settings.tap()
else:
    back()
";
    let result = run(source, &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(device.action_names(), vec!["tap"]);
    assert_eq!(result.action_count, 2, "get_text counts as an action");
}

#[test]
fn get_attributes_returns_a_dict() {
    let mut device = FakeDevice::fixed(home_screen());
    let source = "\
attrs = home__settings.get_attributes()
if attrs['resource_id'] != 'settings' or attrs.get('content_description') != 'Settings':
    back()
";
    let result = run(source, &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert!(device.actions.is_empty(), "Attributes matched, no back()");
}

#[test]
fn scroll_reports_end_of_content() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi"]));
    let source = "\
at_end = settings__list.scroll('down')
if at_end:
    back()
";
    let result = run(source, &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(device.action_names(), vec!["scroll", "back"]);
}

#[test]
fn set_text_scrolls_fields_out_of_the_keyboard_zone() {
    let mut device = FakeDevice::with_transitions(
        vec![login_screen(1900), login_screen(1000)],
        |action, current| match action {
            DeviceAction::Scroll { .. } => 1,
            _ => current,
        },
    );
    let result = run("login__password.set_text('secret')\n", &mut device);

    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(
        device.actions,
        vec![
            DeviceAction::Scroll {
                bounds: [[0, 1900], [1080, 2000]],
                direction: ScrollDirection::Down,
            },
            DeviceAction::InputText {
                x: 540,
                y: 1050,
                text: "secret".to_string(),
            },
        ]
    );
    assert_eq!(
        comments(&result),
        vec![TraceComment::Navigate, TraceComment::Action, TraceComment::Done]
    );
    assert_eq!(result.trace_records[0].node_id, Some(4), "The field itself is scrolled");
    assert_eq!(result.trace_records[1].input.as_deref(), Some("secret"));
}

#[test]
fn set_text_types_directly_above_the_keyboard_zone() {
    let mut device = FakeDevice::fixed(login_screen(500));
    let result = run("login__password.set_text('secret')\n", &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(device.action_names(), vec!["set_text"]);
}

// ============================================================================
// Execution: containers
// ============================================================================

#[test]
fn iteration_index_and_len_follow_direct_children() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi", "Bluetooth", "Display"]));
    let source = "\
texts = []
for row in settings__list:
    texts.append(row.get_text())
last = settings__list[-1].get_text()
if len(settings__list) != 3 or texts != ['Wi-Fi', 'Bluetooth', 'Display'] or last != 'Display':
    back()
";
    let result = run(source, &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert!(device.actions.is_empty(), "All checks passed");
}

#[test]
fn container_lookups_are_logged() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi", "Bluetooth"]));
    let source = "\
n = len(settings__list)
for row in settings__list:
    pass
first = settings__list[0]
found = settings__list.match('Bluetooth')
";
    let result = run(source, &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert!(device.actions.is_empty(), "Lookups never touch the device");
    assert_eq!(result.action_count, 4);

    let lookups: Vec<(Option<&str>, Option<&str>, Option<usize>)> = result
        .trace_records
        .iter()
        .filter(|r| r.comment == TraceComment::Action)
        .map(|r| (r.action.as_deref(), r.element.as_deref(), r.node_id))
        .collect();
    assert_eq!(
        lookups,
        vec![
            (Some("len"), Some("settings__list"), Some(3)),
            (Some("iterate"), Some("settings__list"), Some(3)),
            (Some("index"), Some("settings__list[0]"), Some(4)),
            (Some("match"), Some("settings__list.match('Bluetooth')"), Some(5)),
        ]
    );
    assert_eq!(result.trace_records[2].source_line, Some(4));
}

#[test]
fn match_finds_descendant_by_text() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi", "Bluetooth"]));
    let result = run("settings__list.match(' bluetooth ').tap()\n", &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(device.actions, vec![DeviceAction::Tap { x: 540, y: 425 }]);
}

#[test]
fn match_accepts_attribute_maps() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi", "Bluetooth"]));
    let result = run(
        "settings__list.match({'text': 'Wi-Fi'}).tap()\nsettings__list.match({'resource_id': 'row', 'text': 'Bluetooth'}).tap()\n",
        &mut device,
    );
    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(
        device.actions,
        vec![
            DeviceAction::Tap { x: 540, y: 275 },
            DeviceAction::Tap { x: 540, y: 425 },
        ],
        "A content key decides the match even when other attributes are shared"
    );
}

#[test]
fn match_without_result_is_an_action_error() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi"]));
    let result = run("settings__list.match('Nope').tap()\n", &mut device);

    assert!(!result.completed);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.error_type, "ActionError");
    assert!(error.message.contains("match"), "Got: {}", error.message);
    assert_eq!(device.action_names(), vec!["scroll"], "Container was scrolled once");
}

#[test]
fn index_out_of_range_is_an_action_error() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi"]));
    let result = run("settings__list[7].tap()\n", &mut device);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.error_type, "ActionError");
    assert!(error.message.contains("index"));
    assert!(error.message.contains('7'));
    assert!(device.actions.is_empty());
}

#[test]
fn inner_element_is_located_inside_the_container() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi", "Bluetooth"]));
    let result = run("settings__list.tap(settings__bluetooth)\n", &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert_eq!(device.actions, vec![DeviceAction::Tap { x: 540, y: 425 }]);
    assert_eq!(
        result.trace_records[0].element.as_deref(),
        Some("settings__bluetooth")
    );
}

#[test]
fn inner_element_from_another_screen_is_not_found_in_container() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi"]));
    let result = run("settings__list.get_text(home__greeting)\n", &mut device);

    let error = result.error.as_ref().unwrap();
    assert_eq!(error.error_type, "NotFoundError");
    assert!(
        error.message.contains("inside 'settings__list'"),
        "Got: {}",
        error.message
    );
    assert_eq!(error.element.as_deref(), Some("home__greeting"));
}

#[test]
fn inner_element_expected_here_is_an_xpath_error() {
    let mut device = FakeDevice::fixed(settings_screen(&["Wi-Fi"]));
    let result = run("settings__list.tap(settings__title)\n", &mut device);
    assert_eq!(result.error.as_ref().unwrap().error_type, "XPathError");
}

// ============================================================================
// Execution: failures
// ============================================================================

#[test]
fn unknown_element_fails_before_any_device_action() {
    let mut device = FakeDevice::fixed(home_screen());
    let result = run("home__settings.tap()\nhome__bogus.tap()\n", &mut device);

    assert!(!result.completed);
    assert!(device.actions.is_empty(), "Header runs before the body");
    assert!(matches!(result.failure, Some(RunError::ApiName { ref name }) if name == "home__bogus"));

    let error = result.error.as_ref().unwrap();
    assert_eq!(error.error_type, "ApiNameError");
    assert_eq!(error.element.as_deref(), Some("home__bogus"));
    assert_eq!(error.source_line, Some(2));
    assert_eq!(comments(&result), vec![TraceComment::Crashed, TraceComment::Done]);
}

#[test]
fn action_ceiling_stops_runaway_loops() {
    let mut device = FakeDevice::fixed(home_screen());
    let limits = Limits {
        settle_ms: 0,
        max_action_count: 5,
        ..Limits::default()
    };
    let result = run_with(
        "while True:\n    home__greeting.get_text()\n",
        &mut device,
        RuntimeOptions {
            limits,
            ..RuntimeOptions::default()
        },
    );

    assert!(!result.completed);
    assert!(matches!(
        result.failure,
        Some(RunError::ActionLimitExceeded { limit: 5 })
    ));
    assert_eq!(result.action_count, 5);
    assert_eq!(result.error_kind(), Some("ActionLimitExceeded"));
    let last_two: Vec<TraceComment> = comments(&result).into_iter().rev().take(2).collect();
    assert_eq!(last_two, vec![TraceComment::Done, TraceComment::Crashed]);
}

#[test]
fn loops_without_actions_hit_the_iteration_guard() {
    let mut device = FakeDevice::fixed(home_screen());
    let result = run("while True:\n    pass\n", &mut device);
    assert_eq!(result.error_kind(), Some("ScriptError"));
    assert!(result.error.as_ref().unwrap().message.contains("iterations"));
}

#[test]
fn error_report_points_at_the_failing_source_line() {
    let mut device = FakeDevice::fixed(home_screen());
    let source = "home__settings.tap()\n\nhome__missing.tap()\n";
    let result = run(source, &mut device);

    let error = result.error.as_ref().unwrap();
    assert_eq!(error.error_type, "XPathError");
    assert_eq!(error.source_line, Some(3));
    assert_eq!(error.source_code.as_deref(), Some("home__missing.tap()"));
    assert_eq!(error.compiled_code.as_deref(), Some("home__missing.tap()"));
    assert_eq!(error.compiled_line, Some(5));
    assert_eq!(error.source_script, source);
    assert_eq!(error.screen_name.as_deref(), Some("home"));
    assert!(error.screen.contains("<FrameLayout id='0'"));
}

#[test]
fn script_errors_are_reported() {
    let mut device = FakeDevice::fixed(home_screen());
    for source in [
        "x = y + 1\n",
        "x = 'a' + 1\n",
        "x = 1 // 0\n",
        "x = [1][3]\n",
        "x = 'ab' * 9223372036854775807\n",
        "x = 9223372036854775807 * 'ab'\n",
    ] {
        let result = run(source, &mut device);
        assert_eq!(result.error_kind(), Some("ScriptError"), "For {:?}", source);
    }
}

#[test]
fn range_stops_at_the_integer_limit() {
    let mut device = FakeDevice::fixed(home_screen());
    let source = "\
items = []
for i in range(9223372036854775806, 9223372036854775807, 100):
    items.append(i)
for i in range(-9223372036854775807, -9223372036854775807 - 1, -5):
    items.append(i)
if len(items) != 2:
    back()
";
    let result = run(source, &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert!(device.actions.is_empty());
}

#[test]
fn string_repetition_within_bounds() {
    let mut device = FakeDevice::fixed(home_screen());
    let result = run("if 'ab' * 3 != 'ababab' or 'x' * -2 != '':\n    back()\n", &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert!(device.actions.is_empty());
}

#[test]
fn integer_arithmetic_floors() {
    let mut device = FakeDevice::fixed(home_screen());
    let source = "\
if -7 // 2 != -4 or -7 % 2 != 1 or 7 % -2 != -1 or 2 * 3 + 1 != 7 or 6 / 3 != 2:
    back()
";
    let result = run(source, &mut device);
    assert!(result.completed, "Error: {:?}", result.error);
    assert!(device.actions.is_empty());
}

#[test]
fn back_and_enter_act_on_the_whole_screen() {
    let mut device = FakeDevice::fixed(home_screen());
    let result = run("back()\nenter()\n", &mut device);
    assert!(result.completed);
    assert_eq!(device.actions, vec![DeviceAction::Back, DeviceAction::Enter]);
    assert_eq!(result.trace_records[0].node_id, None);
}
