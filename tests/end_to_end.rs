//! End-to-end integration tests for the NCS toolchain
//!
//! These tests verify the complete workflow:
//! 1. Assemble a pcode listing into a Program
//! 2. Write it to module bytes and read it back
//! 3. Execute the program, with native routines where needed
//! 4. Disassemble the program back to a listing

use ncs_assembler::assemble;
use ncs_disassembler::disassemble;
use ncs_runtime::{
    ExecutionContext, ExitStatus, RoutineError, Routines, SavedState, VMConfig, Variable, VM,
};
use ncs_spec::{NoRoutineNames, Program, VariableType};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Assemble, encode, decode: the program the runtime sees comes from bytes
fn load(name: &str, source: &str, routines: &Routines) -> Arc<Program> {
    let assembled = assemble(name, source, routines).unwrap();
    let bytes = assembled.to_bytes().unwrap();
    let program = Program::from_bytes(name, &bytes).unwrap();
    assert_eq!(program, assembled);
    Arc::new(program)
}

fn start(program: &Arc<Program>, routines: &Arc<Routines>) -> VM {
    VM::new(
        Arc::clone(program),
        Arc::clone(routines),
        ExecutionContext::default(),
        VMConfig::default(),
    )
}

// ============================================================================
// Assemble -> Execute Tests
// ============================================================================

#[test]
fn test_function_call() {
    let source = "
        RSADDI              ; result
        CONSTI 20
        CONSTI 22
        JSR add
        MOVSP -8
        RETN
    add:
        CPTOPSP -8, 4
        CPTOPSP -8, 4
        ADDII
        CPDOWNSP -16, 4
        MOVSP -4
        RETN
    ";
    let routines = Arc::new(Routines::empty());
    let program = load("call", source, &routines);
    let result = start(&program, &routines).run().unwrap();

    assert_eq!(result.status, ExitStatus::Returned);
    assert_eq!(result.stack, vec![Variable::Int(42)]);
}

#[test]
fn test_sum_loop() {
    let source = "
        CONSTI 0            ; sum
        CONSTI 100          ; i
    loop:
        CPTOPSP -4, 4
        JZ done
        CPTOPSP -4, 4
        CPTOPSP -12, 4
        ADDII
        CPDOWNSP -12, 4
        MOVSP -4
        DECISP -4
        JMP loop
    done:
        MOVSP -4
        RETN
    ";
    let routines = Arc::new(Routines::empty());
    let program = load("sum", source, &routines);
    let result = start(&program, &routines).run().unwrap();

    assert_eq!(result.return_value(), Some(5050));
    assert_eq!(result.stack.len(), 1);
}

#[test]
fn test_string_concatenation_reaches_routine() {
    let printed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&printed);
    let routines = Arc::new(
        Routines::builder()
            .register(
                1,
                "PrintString",
                VariableType::Void,
                vec![VariableType::String],
                move |args, _| {
                    let text = args[0].as_str().map_err(|e| RoutineError::Fault(e.to_string()))?;
                    sink.lock().unwrap().push(text.to_string());
                    Ok(Variable::Void)
                },
            )
            .build()
            .unwrap(),
    );

    let source = r#"
        CONSTS "Hello, "
        CONSTS "world\n"
        ADDSS
        ACTION PrintString, 1
        RETN
    "#;
    let program = load("hello", source, &routines);
    let result = start(&program, &routines).run().unwrap();

    assert!(result.stack.is_empty());
    assert_eq!(*printed.lock().unwrap(), vec!["Hello, world\n".to_string()]);
}

#[test]
fn test_caller_object_reaches_routine() {
    let routines = Arc::new(
        Routines::builder()
            .register(
                0,
                "GetTag",
                VariableType::String,
                vec![VariableType::Object],
                |args, _| match args[0] {
                    Variable::Object(77) => Ok(Variable::String("innkeeper".to_string())),
                    ref other => Err(RoutineError::Fault(format!("unexpected {:?}", other))),
                },
            )
            .build()
            .unwrap(),
    );

    let source = "
        CONSTO 0
        ACTION GetTag, 1
        RETN
    ";
    let program = load("tag", source, &routines);
    let vm = VM::new(
        program,
        routines,
        ExecutionContext::with_caller(77),
        VMConfig::default(),
    );
    let result = vm.run().unwrap();
    assert_eq!(result.stack, vec![Variable::String("innkeeper".to_string())]);
}

// ============================================================================
// Deferred Execution Tests
// ============================================================================

/// DelayCommand keeps the action; PrintInteger records what it is given
fn deferred_table(delayed: &Arc<Mutex<Vec<SavedState>>>, printed: &Arc<Mutex<Vec<i32>>>) -> Routines {
    let delayed = Arc::clone(delayed);
    let printed = Arc::clone(printed);
    Routines::builder()
        .register(
            0,
            "DelayCommand",
            VariableType::Void,
            vec![VariableType::Float, VariableType::Action],
            move |args, _| match &args[1] {
                Variable::Action(state) => {
                    delayed.lock().unwrap().push((**state).clone());
                    Ok(Variable::Void)
                }
                other => Err(RoutineError::Fault(format!("not an action: {:?}", other))),
            },
        )
        .register(
            1,
            "PrintInteger",
            VariableType::Void,
            vec![VariableType::Int],
            move |args, _| {
                let value = args[0].as_int().map_err(|e| RoutineError::Fault(e.to_string()))?;
                printed.lock().unwrap().push(value);
                Ok(Variable::Void)
            },
        )
        .build()
        .unwrap()
}

#[test]
fn test_delay_command_runs_later() {
    // the deferred block prints the local copied at STORE_STATE time
    let source = "
        CONSTI 7            ; global
        SAVEBP
        CONSTI 11           ; local
        STORE_STATE 4, 4
        JMP queue
        CPTOPSP -4, 4
        ACTION PrintInteger, 1
        RETN
    queue:
        CONSTF 1.5
        ACTION DelayCommand, 2
        RETN
    ";
    let delayed = Arc::new(Mutex::new(Vec::new()));
    let printed = Arc::new(Mutex::new(Vec::new()));
    let routines = Arc::new(deferred_table(&delayed, &printed));
    let program = load("delay", source, &routines);

    let first = start(&program, &routines).run().unwrap();
    assert_eq!(first.status, ExitStatus::Returned);
    assert!(printed.lock().unwrap().is_empty());

    let state = delayed.lock().unwrap().pop().unwrap();
    assert_eq!(state.globals, vec![Variable::Int(7)]);
    assert_eq!(state.locals, vec![Variable::Int(11)]);

    // the host may persist the action between runs
    let state = SavedState::from_bytes(&state.to_bytes().unwrap()).unwrap();
    let later = VM::resume(
        Arc::clone(&program),
        Arc::clone(&routines),
        &state,
        ExecutionContext::default(),
        VMConfig::default(),
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(later.status, ExitStatus::Returned);
    assert_eq!(*printed.lock().unwrap(), vec![11]);
}

#[test]
fn test_yielding_routine_is_retried_on_resume() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let routines = Arc::new(
        Routines::builder()
            .register(
                0,
                "WaitForPlayer",
                VariableType::Int,
                vec![VariableType::Int],
                move |args, _| {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(RoutineError::Yield);
                    }
                    let value = args[0].as_int().map_err(|e| RoutineError::Fault(e.to_string()))?;
                    Ok(Variable::Int(value * 2))
                },
            )
            .build()
            .unwrap(),
    );

    let source = "
        CONSTI 21
        ACTION WaitForPlayer, 1
        RETN
    ";
    let program = load("wait", source, &routines);

    let first = start(&program, &routines).run().unwrap();
    assert_eq!(first.status, ExitStatus::Suspended);
    let saved = first.saved_state.unwrap();

    let second = VM::resume(
        program,
        routines,
        &saved,
        ExecutionContext::default(),
        VMConfig::default(),
    )
    .unwrap()
    .run()
    .unwrap();
    assert_eq!(second.status, ExitStatus::Returned);
    assert_eq!(second.return_value(), Some(42));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Execute -> Disassemble Tests
// ============================================================================

#[test]
fn test_module_bytes_survive_listing_round_trip() {
    let source = "
        RSADDF
        CONSTF 0.25
        CONSTF 4.0
        MULFF
        CPDOWNSP -8, 4
        MOVSP -4
        RETN
    ";
    let program = load("scale", source, &Arc::new(Routines::empty()));
    let bytes = program.to_bytes().unwrap();

    let listing = disassemble(&program, &NoRoutineNames).unwrap();
    let again = assemble("scale", &listing, &NoRoutineNames).unwrap();
    assert_eq!(again.to_bytes().unwrap(), bytes);

    let result = ncs_runtime::run(again).unwrap();
    assert_eq!(result.stack, vec![Variable::Float(1.0)]);
}

proptest! {
    #[test]
    fn prop_listed_constants_execute_in_order(values in prop::collection::vec(any::<i32>(), 1..32)) {
        let source: String = values.iter().map(|v| format!("CONSTI {}\n", v)).collect();
        let program = assemble("consts", &source, &NoRoutineNames).unwrap();
        let listing = disassemble(&program, &NoRoutineNames).unwrap();
        let again = assemble("consts", &listing, &NoRoutineNames).unwrap();

        let result = ncs_runtime::run(again).unwrap();
        let expected: Vec<Variable> = values.into_iter().map(Variable::Int).collect();
        prop_assert_eq!(result.stack, expected);
        prop_assert_eq!(result.status, ExitStatus::Returned);
    }
}
