mod launcher_workflow;
mod properties;
