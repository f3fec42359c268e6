use guidepath_core::machine::ProgressSnapshot;
use mentor_agent::{MentorContext, StepContext};

/// Shape the learner's position into the context sent with a mentor question.
pub fn mentor_context(snapshot: &ProgressSnapshot) -> MentorContext {
    MentorContext {
        platform: snapshot.platform.as_str().to_string(),
        module: snapshot.module.clone(),
        current_step: snapshot.current_step.as_ref().map(|s| StepContext {
            title: s.title.clone(),
            description: s.description.clone(),
            tip: s.tip.clone(),
            warning: s.warning.clone(),
        }),
        step_index: snapshot.step_index,
        total_steps: snapshot.total_steps,
        completed_steps: snapshot.completed_steps.clone(),
    }
}
