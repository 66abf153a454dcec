//! Behaviour-driven tests for dependency-ordered compilation.
//!
//! The vendor compiler is replaced by [`FakeToolchain`], which writes the
//! artifacts a real compiler run would leave behind.

mod support;

use camino::Utf8PathBuf;
use relpipe::compiler::{CompileConfig, ModuleCompiler};
use relpipe::error::PipelineError;
use relpipe::graph::ModuleGraph;
use relpipe::module::{CompiledArtifact, Module, ModuleKind, ModuleName, ModuleSpec, PlatformVariant};
use relpipe::test_utils::{FakeToolchain, ToolKind};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::collections::BTreeMap;
use support::Project;

const BASE_LIBRARY: &str = "/sdk/4.5/lib/net_rim_api.jar";

struct CompileWorld {
    project: Project,
    specs: Vec<ModuleSpec>,
    order: Option<relpipe::error::Result<Vec<ModuleName>>>,
    outcome: Option<relpipe::error::Result<Vec<CompiledArtifact>>>,
    tools: FakeToolchain,
}

#[fixture]
fn world() -> CompileWorld {
    CompileWorld {
        project: Project::empty(),
        specs: Vec::new(),
        order: None,
        outcome: None,
        tools: FakeToolchain::new(),
    }
}

impl CompileWorld {
    fn add_spec(&mut self, name: &str, depends_on: Vec<ModuleName>) {
        self.project.add_module(name);
        self.specs.push(ModuleSpec {
            name: ModuleName::from(name),
            kind: ModuleKind::Library,
            descriptor: Utf8PathBuf::from(format!("{name}/{name}.jdp")),
            source_dirs: vec![Utf8PathBuf::from(format!("{name}/src"))],
            resource_dirs: Vec::new(),
            depends_on,
            variants: None,
            variant_source_dirs: BTreeMap::new(),
        });
    }

    fn module(&self, name: &str) -> Module {
        let spec = self
            .specs
            .iter()
            .find(|spec| spec.name.as_str() == name)
            .expect("module declared");
        Module {
            name: spec.name.clone(),
            kind: spec.kind,
            variant: variant().name,
            source_files: vec![format!("{name}/src/{name}.java")],
            resource_files: Vec::new(),
            depends_on: spec.depends_on.clone(),
            descriptor_path: self.project.path(spec.descriptor.as_str()),
        }
    }

    fn compile(&self, names: &[ModuleName]) -> relpipe::error::Result<Vec<CompiledArtifact>> {
        let config = CompileConfig {
            root_dir: self.project.root().to_owned(),
            build_root: self.project.path("build"),
            warn_keys: Vec::new(),
            timeout: None,
        };
        let modules: Vec<Module> = names.iter().map(|name| self.module(name.as_str())).collect();
        ModuleCompiler::new(&config, &self.tools).compile(&modules, &variant())
    }
}

fn variant() -> PlatformVariant {
    PlatformVariant {
        name: "bb45".to_owned(),
        compiler: Utf8PathBuf::from("/sdk/4.5/bin/rapc"),
        base_library: Utf8PathBuf::from(BASE_LIBRARY),
    }
}

#[given("module \"{name}\" with no dependencies")]
fn given_independent_module(world: &mut CompileWorld, name: String) {
    world.add_spec(&name, Vec::new());
}

#[given("module \"{name}\" depending on \"{dependency}\"")]
fn given_dependent_module(world: &mut CompileWorld, name: String, dependency: String) {
    world.add_spec(&name, vec![ModuleName::from(dependency)]);
}

#[when("the build order is computed")]
fn when_build_order(world: &mut CompileWorld) {
    let order = ModuleGraph::new(&world.specs).and_then(|graph| graph.build_order());
    world.order = Some(order);
}

#[when("the modules are compiled in build order")]
fn when_compiled_in_order(world: &mut CompileWorld) {
    let order = match world.order.as_ref().expect("build order computed") {
        Ok(order) => order.clone(),
        Err(err) => panic!("build order failed: {err}"),
    };
    world.outcome = Some(world.compile(&order));
}

#[when("only \"{name}\" is compiled")]
fn when_compiled_alone(world: &mut CompileWorld, name: String) {
    world.outcome = Some(world.compile(&[ModuleName::from(name)]));
}

#[then("the compiler ran for \"{first}\" then \"{second}\"")]
fn then_compile_order(world: &mut CompileWorld, first: String, second: String) {
    assert_eq!(world.tools.compiled_modules(), vec![first.clone(), second.clone()]);
    let artifacts = match world.outcome.as_ref().expect("compiled") {
        Ok(artifacts) => artifacts,
        Err(err) => panic!("compilation failed: {err}"),
    };
    let built: Vec<&str> = artifacts.iter().map(|a| a.module.as_str()).collect();
    assert_eq!(built, vec![first.as_str(), second.as_str()]);
    assert!(artifacts.iter().all(|artifact| artifact.code_path.is_file()));
}

#[then("\"{name}\" imported the base library and the \"{dependency}\" library")]
fn then_imports(world: &mut CompileWorld, name: String, dependency: String) {
    let expected = format!(
        "import={BASE_LIBRARY};{}",
        world.project.path(&format!("build/bb45/{dependency}.jar"))
    );
    let call = world
        .tools
        .calls_to(ToolKind::Compiler)
        .into_iter()
        .find(|call| {
            call.arguments()
                .iter()
                .any(|arg| arg.ends_with(&format!("/bb45/{name}")))
        })
        .expect("compiler invoked for module");
    assert!(
        call.arguments().contains(&expected),
        "expected {expected} in {call}"
    );
}

#[then("compilation fails because \"{name}\" needs \"{dependency}\"")]
fn then_dependency_not_built(world: &mut CompileWorld, name: String, dependency: String) {
    let outcome = world.outcome.as_ref().expect("compiled");
    let Err(PipelineError::DependencyNotBuilt {
        module,
        dependency: missing,
        ..
    }) = outcome
    else {
        panic!("expected DependencyNotBuilt, got {outcome:?}");
    };
    assert_eq!(module.as_str(), name);
    assert_eq!(missing.as_str(), dependency);
}

#[then("the compiler never ran")]
fn then_no_compiler_calls(world: &mut CompileWorld) {
    assert!(world.tools.calls_to(ToolKind::Compiler).is_empty());
}

#[then("the build order is rejected as a cycle")]
fn then_cycle(world: &mut CompileWorld) {
    let order = world.order.as_ref().expect("build order computed");
    assert!(
        matches!(order, Err(PipelineError::DependencyCycle { .. })),
        "unexpected order: {order:?}"
    );
}

#[scenario(
    path = "tests/features/compile_order.feature",
    name = "Modules compile in build order"
)]
fn scenario_build_order(world: CompileWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/compile_order.feature",
    name = "A module whose dependency was not built is rejected"
)]
fn scenario_dependency_not_built(world: CompileWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/compile_order.feature",
    name = "A dependency cycle is rejected"
)]
fn scenario_cycle(world: CompileWorld) {
    let _ = world;
}
