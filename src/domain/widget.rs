// Dashboard widget domain models
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Grid rectangle in layout units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetLayout {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_h: Option<u32>,
}

impl WidgetLayout {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            min_w: None,
            min_h: None,
            max_w: None,
            max_h: None,
        }
    }

    pub fn rect(&self) -> GridRect {
        GridRect {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }

    /// Move/resize to `rect`, clamping the size to this layout's bounds
    pub fn with_rect(&self, rect: GridRect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            w: clamp(rect.w, self.min_w, self.max_w),
            h: clamp(rect.h, self.min_h, self.max_h),
            ..*self
        }
    }
}

fn clamp(value: u32, min: Option<u32>, max: Option<u32>) -> u32 {
    let value = min.map_or(value, |m| value.max(m));
    let value = max.map_or(value, |m| value.min(m));
    value.max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    #[serde(rename = "type")]
    pub widget_type: String,
    pub layout: WidgetLayout,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u32>,
}

fn default_visible() -> bool {
    true
}

/// A widget as submitted by the client, before the server assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDraft {
    #[serde(rename = "type")]
    pub widget_type: String,
    pub layout: WidgetLayout,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<WidgetLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPatch<'a> {
    pub widget_id: &'a str,
    pub layout: GridRect,
}

/// Owned form of a layout patch, as received from UI clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutChange {
    pub widget_id: String,
    pub layout: GridRect,
}

impl LayoutChange {
    pub fn as_patch(&self) -> LayoutPatch<'_> {
        LayoutPatch {
            widget_id: &self.widget_id,
            layout: self.layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_widget_wire_format() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "w-1",
            "type": "gauge",
            "layout": {"x": 0, "y": 2, "w": 4, "h": 3, "minW": 2},
            "config": {"tagId": "t1"},
            "title": "Boiler pressure",
            "refreshInterval": 5
        }))
        .unwrap();

        assert_eq!(widget.widget_type, "gauge");
        assert_eq!(widget.layout.min_w, Some(2));
        assert!(widget.visible);
        assert_eq!(widget.refresh_interval, Some(5));
    }

    #[test]
    fn test_patch_omits_unset_fields() {
        let patch = WidgetPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"title": "Renamed"}));
    }

    #[test]
    fn test_with_rect_clamps_to_bounds() {
        let layout = WidgetLayout {
            min_w: Some(2),
            max_h: Some(4),
            ..WidgetLayout::new(0, 0, 3, 3)
        };

        let moved = layout.with_rect(GridRect { x: 5, y: 1, w: 1, h: 9 });
        assert_eq!(moved.rect(), GridRect { x: 5, y: 1, w: 2, h: 4 });
        assert_eq!(moved.min_w, Some(2));
    }

    #[test]
    fn test_layout_change_wire_format() {
        let change = LayoutChange {
            widget_id: "w-1".to_string(),
            layout: GridRect { x: 1, y: 2, w: 3, h: 4 },
        };
        assert_eq!(
            serde_json::to_value(change.as_patch()).unwrap(),
            json!({"widgetId": "w-1", "layout": {"x": 1, "y": 2, "w": 3, "h": 4}})
        );
    }
}
