use bitrunner_plugin_sdk::prelude::*;

/// TestPlugin implements a subset of tools for testing.
#[derive(Describe)]
#[plugin(name = "test_plugin", version = "0.1")]
pub struct TestPlugin;

impl Plugin for TestPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Ok(TestPlugin)
    }

    fn setup(&self, command: &mut CommandSpec) -> Result<(), PluginError> {
        command
            .add_arg(
                ArgSpec::short_option("simple_value", 's')
                    .help("Store a simple value"),
            )
            .add_arg(
                ArgSpec::short_option("constant_value", 'c')
                    .store_const("value-to-store")
                    .help("Store a constant value"),
            )
            .add_arg(
                ArgSpec::short_option("boolean_switch", 't')
                    .store_true()
                    .default(false)
                    .help("Set a switch to true"),
            )
            .add_arg(
                ArgSpec::short_option("boolean_switch_off", 'f')
                    .dest("boolean_switch")
                    .store_false()
                    .default(false)
                    .help("Set a switch to false"),
            )
            .add_arg(
                ArgSpec::short_option("collection", 'a')
                    .append()
                    .help("Add repeated values to a list"),
            );
        Ok(())
    }

    fn execute(&self, options: &OptionSet) -> Result<Outcome, PluginError> {
        debug!(
            simple_value = ?options.get_str("simple_value"),
            constant_value = ?options.get_str("constant_value"),
            boolean_switch = ?options.get_bool("boolean_switch"),
            collection = ?options.get_list("collection"),
            "test_plugin executed"
        );
        Ok(Outcome::None)
    }
}

export_plugin!(TestPlugin);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports_test_plugin() {
        let module = plugin_module();
        assert_eq!(module.name(), "test_plugin");

        let factory = module.get("TestPlugin").expect("TestPlugin export");
        let plugin = factory(&PluginContext::new(".")).unwrap();
        assert_eq!(plugin.name(), "test_plugin");
        assert_eq!(plugin.version(), Some("0.1"));
        assert_eq!(
            plugin.help(),
            "TestPlugin implements a subset of tools for testing."
        );
    }

    #[test]
    fn test_setup_declares_valid_flags() {
        let mut spec = CommandSpec::new("test_plugin", "");
        TestPlugin.setup(&mut spec).unwrap();

        assert_eq!(spec.args.len(), 5);
        assert!(spec.validate().is_ok());

        let shared: Vec<_> = spec
            .args
            .iter()
            .filter(|a| a.dest == "boolean_switch")
            .collect();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn test_execute_returns_nothing() {
        let outcome = TestPlugin.execute(&OptionSet::new()).unwrap();
        assert_eq!(outcome.exit_status(), 0);
    }
}
