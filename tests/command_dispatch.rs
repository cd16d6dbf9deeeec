//! Command tree tests
//!
//! Build trees from YAML declarations and dispatch through an opened shell.

mod common;

use std::sync::Arc;

use device_shell::commands::{CommandSpec, CommandTree};
use device_shell::error::DeviceError;
use device_shell::Shell;

use common::{ScriptedDevice, fast_settings};

fn spec(yaml: &str) -> CommandSpec {
    let raw: serde_json::Value = serde_saphyr::from_str(yaml).unwrap();
    CommandSpec::from_value(&raw).unwrap()
}

fn tree(yaml: &str) -> (CommandTree, ScriptedDevice) {
    let device = ScriptedDevice::new();
    let shell = Arc::new(Shell::new(device.clone(), fast_settings()).unwrap());
    shell.open().unwrap();
    (CommandTree::build(&spec(yaml), shell), device)
}

#[test]
fn test_resolve_leaf() {
    let (tree, _device) = tree("system:\n  identity:\n");
    let node = tree.resolve(&["system", "identity"]).unwrap();
    assert!(node.is_leaf());
    assert_eq!(node.name(), "identity");
}

#[test]
fn test_missing_subcommand() {
    let (tree, _device) = tree("system:\n  identity:\n");
    match tree.resolve(&["system", "missing"]).unwrap_err() {
        DeviceError::NoSuchSubCommand {
            command,
            subcommand,
        } => {
            assert_eq!(command, "system");
            assert_eq!(subcommand, "missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_command_message() {
    let (tree, _device) = tree("beep:\n");
    let err = tree.resolve(&["reboot"]).unwrap_err();
    assert_eq!(err.to_string(), "reboot command doesn't exist");
}

#[test]
fn test_invoke_sends_full_path_with_args() {
    let (tree, device) = tree("system:\n  identity:\n");
    let response = tree.invoke(&["system", "identity"], &["print"]).unwrap();

    assert_eq!(response, "name: MikroTik");
    assert_eq!(
        device.written().last().map(String::as_str),
        Some("system identity print")
    );
}

#[test]
fn test_invoke_without_args_has_no_trailing_space() {
    let (tree, device) = tree("beep:\n");
    assert_eq!(tree.invoke(&["beep"], &[]).unwrap(), "");
    assert_eq!(device.written().last().map(String::as_str), Some("beep"));
}

#[test]
fn test_invoke_multiple_args() {
    let (tree, device) = tree("ip:\n  address:\n    add:\n");
    device.respond("ip address add address=10.0.0.1/24 interface=ether1", "");
    tree.invoke(
        &["ip", "address", "add"],
        &["address=10.0.0.1/24", "interface=ether1"],
    )
    .unwrap();
    assert_eq!(
        device.written().last().map(String::as_str),
        Some("ip address add address=10.0.0.1/24 interface=ether1")
    );
}

#[test]
fn test_branch_invocation_fails_without_sending() {
    let (tree, device) = tree("ip:\n  address:\n    print:\n");
    let sent = device.written().len();

    let err = tree.invoke(&["ip"], &["address", "print"]).unwrap_err();
    assert!(matches!(err, DeviceError::NotALeafCommand { .. }));
    assert_eq!(device.written().len(), sent);
}

#[test]
fn test_siblings_keep_their_subcommands() {
    let (tree, _device) = tree(
        r"
interface:
  ethernet:
    print:
    set:
  bridge:
    port:
      print:
    print:
  vlan:
    add:
",
    );
    assert_eq!(
        tree.leaf_paths(),
        [
            "interface bridge port print",
            "interface bridge print",
            "interface ethernet print",
            "interface ethernet set",
            "interface vlan add",
        ]
    );
}

#[test]
fn test_commands_listing() {
    let (tree, _device) = tree("beep:\nsystem:\n  identity:\n");
    let names: Vec<&str> = tree.commands().map(|node| node.name()).collect();
    assert_eq!(names, ["beep", "system"]);
}
