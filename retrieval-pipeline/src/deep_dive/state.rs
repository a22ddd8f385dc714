use state_machines::state_machine;

state_machine! {
    name: DeepDiveMachine,
    state: DeepDiveState,
    initial: Ready,
    states: [Ready, Seeded, Extracted, Expanded, Resolved, Scored, Rendered, Failed],
    events {
        seed { transition: { from: Ready, to: Seeded } }
        extract { transition: { from: Seeded, to: Extracted } }
        expand { transition: { from: Extracted, to: Expanded } }
        resolve { transition: { from: Expanded, to: Resolved } }
        score { transition: { from: Resolved, to: Scored } }
        render { transition: { from: Scored, to: Rendered } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Seeded, to: Failed }
            transition: { from: Extracted, to: Failed }
            transition: { from: Expanded, to: Failed }
            transition: { from: Resolved, to: Failed }
            transition: { from: Scored, to: Failed }
        }
    }
}

pub fn ready() -> DeepDiveMachine<(), Ready> {
    DeepDiveMachine::new(())
}
