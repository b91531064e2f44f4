//! Built-in prompt templates

/// Registered name of the need refinement prompt
pub const NEED_REFINEMENT: &str = "need_refinement";

/// Registered name of the code synthesis prompt
pub const TOOL_SYNTHESIS: &str = "tool_synthesis";

pub const NEED_REFINEMENT_SYSTEM: &str = "You decide whether an autonomous agent is missing a tool. \
Prefer reusing an existing tool over proposing a new one. Answer with prose if you like, \
but include exactly one JSON object with the requested fields.";

pub const NEED_REFINEMENT_TEMPLATE: &str = r#"## User Input
{{input}}
{{#if prior_failure}}

## Previous Failed Attempt
{{prior_failure}}
{{/if}}

## Detected Category
{{category}}

## Triggered Patterns
{{#each triggers}}
- {{this}}
{{/each}}

## Existing Tools
{{#if existing_tools}}
{{#each existing_tools}}
- {{this}}
{{/each}}
{{else}}
(none)
{{/if}}

## Response Format
Respond with a JSON object:
{"needs_new_tool": bool, "tool_name": string, "purpose": string, "input_type": string, "output_type": string, "priority": number between 0 and 1, "confidence": number between 0 and 1, "reasoning": string}

Set "needs_new_tool" to false when an existing tool already covers the request.
"#;

pub const TOOL_SYNTHESIS_SYSTEM: &str = "You write small, self-contained tool modules for an agent runtime. \
Use only the standard library. Never use unsafe code, spawn processes, open network connections \
or write files. Reply with a single fenced code block.";

pub const TOOL_SYNTHESIS_TEMPLATE: &str = r#"## Tool
Name: {{name}}
Purpose: {{purpose}}
Input: {{input_type}}
Output: {{output_type}}
{{#if reasoning}}

## Why It Is Needed
{{reasoning}}
{{/if}}

## Requirements
- A single {{language}} source file
- Expose a public function `run(input: &str) -> Result<String, String>`
- No dependencies outside the standard library
{{#if diagnostics}}

---

## Previous Attempt Failed To Compile

```{{language}}
{{previous_source}}
```

### Diagnostics
```
{{diagnostics}}
```

Fix the errors and return the complete corrected file.
{{/if}}
"#;
