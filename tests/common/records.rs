use screen_script::document::{LocatorDocument, from_json_str};
use screen_script::tree::{NodeRecord, UiTree, build};

/// Builder for one flat view record.
pub struct Rec(NodeRecord);

impl Rec {
    pub fn new(id: usize, parent: i64, class: &str) -> Self {
        Rec(NodeRecord {
            temp_id: id,
            parent,
            children: Vec::new(),
            class: Some(class.to_string()),
            text: None,
            content_description: None,
            resource_id: None,
            bounds: [[0, 0], [1080, 1920]],
            enabled: true,
            visible: true,
            scrollable: false,
            editable: false,
            clickable: false,
            long_clickable: false,
            checkable: false,
            checked: false,
            selected: false,
        })
    }

    pub fn rid(mut self, rid: &str) -> Self {
        self.0.resource_id = Some(format!("com.example:id/{}", rid));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.0.text = Some(text.to_string());
        self
    }

    pub fn alt(mut self, alt: &str) -> Self {
        self.0.content_description = Some(alt.to_string());
        self
    }

    pub fn bounds(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.0.bounds = [[left, top], [right, bottom]];
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.0.scrollable = true;
        self
    }

    pub fn checked(mut self) -> Self {
        self.0.checkable = true;
        self.0.checked = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.0.visible = false;
        self
    }

    pub fn done(self) -> NodeRecord {
        self.0
    }
}

/// Fills in `children` from the parent links.
pub fn records(recs: Vec<Rec>) -> Vec<NodeRecord> {
    let mut out: Vec<NodeRecord> = recs.into_iter().map(Rec::done).collect();
    for i in 0..out.len() {
        let parent = out[i].parent;
        if parent >= 0 && (parent as usize) < out.len() {
            out[parent as usize].children.push(i);
        }
    }
    out
}

pub fn tree(recs: Vec<Rec>) -> UiTree {
    build(&records(recs)).expect("fixture records build a tree")
}

// ============================================================================
// Screens
// ============================================================================

/// Home screen: a toolbar, a settings button and a non-scrolling body.
pub fn home_screen() -> Vec<NodeRecord> {
    records(vec![
        Rec::new(0, -1, "android.widget.FrameLayout").rid("root"),
        Rec::new(1, 0, "android.widget.LinearLayout").rid("toolbar").bounds(0, 0, 1080, 200),
        Rec::new(2, 1, "android.widget.TextView").rid("title").text("Home"),
        Rec::new(3, 1, "android.widget.ImageButton").rid("settings").alt("Settings").bounds(900, 0, 1080, 200),
        Rec::new(4, 0, "android.widget.LinearLayout").rid("body").bounds(0, 200, 1080, 1920),
        Rec::new(5, 4, "android.widget.TextView").rid("greeting").text("Welcome"),
    ])
}

/// Settings screen with a scrolling list. `rows` are the visible row texts.
pub fn settings_screen(rows: &[&str]) -> Vec<NodeRecord> {
    let mut recs = vec![
        Rec::new(0, -1, "android.widget.FrameLayout").rid("root"),
        Rec::new(1, 0, "android.widget.LinearLayout").rid("settings_bar").bounds(0, 0, 1080, 200),
        Rec::new(2, 1, "android.widget.TextView").rid("settings_title").text("Settings"),
        Rec::new(3, 0, "android.widget.ListView")
            .rid("settings_list")
            .bounds(0, 200, 1080, 1920)
            .scrollable(),
    ];
    for (i, row) in rows.iter().enumerate() {
        let top = 200 + 150 * i as i32;
        recs.push(
            Rec::new(4 + i, 3, "android.widget.TextView")
                .rid("row")
                .text(row)
                .bounds(0, top, 1080, top + 150),
        );
    }
    records(recs)
}

/// Login screen whose password field sits at the very bottom.
pub fn login_screen(field_top: i32) -> Vec<NodeRecord> {
    records(vec![
        Rec::new(0, -1, "android.widget.FrameLayout").rid("root").bounds(0, 0, 1080, 2000),
        Rec::new(1, 0, "android.widget.ScrollView")
            .rid("login_form")
            .bounds(0, 0, 1080, 2000)
            .scrollable(),
        Rec::new(2, 1, "android.widget.LinearLayout").rid("login_fields"),
        Rec::new(3, 2, "android.widget.EditText").rid("username").bounds(0, 300, 1080, 400),
        Rec::new(4, 2, "android.widget.EditText")
            .rid("password")
            .bounds(0, field_top, 1080, field_top + 100),
    ])
}

pub const HOME_SKELETON: &str = "<FrameLayout resource_id='root'><LinearLayout resource_id='toolbar'><TextView resource_id='title'></TextView><ImageButton resource_id='settings'></ImageButton></LinearLayout><LinearLayout resource_id='body'><TextView resource_id='greeting'></TextView></LinearLayout></FrameLayout>";

pub const SETTINGS_SKELETON: &str = "<FrameLayout resource_id='root'><LinearLayout resource_id='settings_bar'><TextView resource_id='settings_title'></TextView></LinearLayout><ListView resource_id='settings_list'><TextView resource_id='row'></TextView></ListView></FrameLayout>";

pub const LOGIN_SKELETON: &str = "<FrameLayout resource_id='root'><ScrollView resource_id='login_form'><LinearLayout resource_id='login_fields'><EditText resource_id='username'></EditText><EditText resource_id='password'></EditText></LinearLayout></ScrollView></FrameLayout>";

/// Home and settings screens. The Wi-Fi row is reached from home by tapping
/// the settings button.
pub fn app_document() -> LocatorDocument {
    let json = serde_json::json!({
        "home": {
            "skeleton": HOME_SKELETON,
            "elements": {
                "home__settings": {
                    "locators": ["//ImageButton[@resource_id='settings']"],
                    "paths": []
                },
                "home__greeting": {
                    "locators": ["//TextView[@resource_id='greeting']"]
                },
                "home__missing": {
                    "locators": ["//Button[@resource_id='never_there']"]
                }
            }
        },
        "settings": {
            "skeleton": SETTINGS_SKELETON,
            "elements": {
                "settings__list": {
                    "locators": ["//ListView[@resource_id='settings_list']"],
                    "paths": [["home__settings.tap()"]]
                },
                "settings__wifi": {
                    "locators": ["//TextView[@text='Wi-Fi']"],
                    "paths": [["home__settings.tap()"]]
                },
                "settings__title": {
                    "locators": ["//TextView[@resource_id='settings_title']"],
                    "paths": [["home__settings.tap()"]]
                },
                "settings__bluetooth": {
                    "locators": ["//TextView[@text='Bluetooth']"]
                }
            }
        },
        "login": {
            "skeleton": LOGIN_SKELETON,
            "elements": {
                "login__form": {
                    "locators": ["//ScrollView[@resource_id='login_form']"]
                },
                "login__password": {
                    "locators": ["//EditText[@resource_id='password']"]
                }
            }
        }
    });
    from_json_str(&json.to_string()).expect("fixture document parses")
}
